//! Config command - print the bootstrapped configuration

use clap::Args;

use crate::bootstrap::bootstrap;
use crate::cli::{output, Cli};
use crate::exit_codes;

use super::BootstrapArgs;

/// Print the configuration a run would use
#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(flatten)]
    pub bootstrap: BootstrapArgs,

    /// Print values with references left in place
    #[arg(long)]
    pub unresolved: bool,
}

impl ConfigCommand {
    pub fn execute(&self, _cli: &Cli) -> anyhow::Result<i32> {
        let config = bootstrap(&self.bootstrap.options())?;

        if self.unresolved {
            output::json(config.unresolved())?;
        } else {
            output::json(config.resolved())?;
        }
        Ok(exit_codes::SUCCESS)
    }
}
