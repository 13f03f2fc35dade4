//! CLI definition and command handling

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::{ConfigCommand, ConsolidateCommand, DepositCommand, RunCommand};

/// Timberyard - continuous integration runner
#[derive(Debug, Parser)]
#[command(name = "timberyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the checkout, integrate and publish phases
    Run(RunCommand),

    /// Print the bootstrapped configuration
    Config(ConfigCommand),

    /// Merge host reports of one commit into a consolidated report
    Consolidate(ConsolidateCommand),

    /// File a host report into a report store
    Deposit(DepositCommand),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub fn execute(self) -> anyhow::Result<i32> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::Config(ref cmd) => cmd.execute(&self),
            Commands::Consolidate(ref cmd) => cmd.execute(&self),
            Commands::Deposit(ref cmd) => cmd.execute(&self),
        }
    }
}
