//! CLI commands

mod config;
mod consolidate;
mod deposit;
mod run;

use std::path::PathBuf;

use clap::Args;

use crate::bootstrap::{BootstrapOptions, Mode};

pub use config::ConfigCommand;
pub use consolidate::ConsolidateCommand;
pub use deposit::DepositCommand;
pub use run::RunCommand;

/// Arguments shared by the commands that bootstrap a configuration
#[derive(Debug, Clone, Args)]
pub struct BootstrapArgs {
    /// Where build metadata comes from
    #[arg(long, value_enum, default_value = "standard")]
    pub mode: Mode,

    /// Source directory (default: current directory)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output directory (default: <input>/.timberyard)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Override a configuration value (e.g. -o meta.variants.integrate=c++)
    #[arg(short = 'o', long = "option", value_name = "PATH=VALUE")]
    pub assignments: Vec<String>,
}

impl BootstrapArgs {
    pub fn options(&self) -> BootstrapOptions {
        BootstrapOptions {
            mode: self.mode,
            input: self.input.clone(),
            output: self.output.clone(),
            assignments: self.assignments.clone(),
        }
    }
}
