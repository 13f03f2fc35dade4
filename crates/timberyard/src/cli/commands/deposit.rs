//! Deposit command - file a host report into a report store

use std::path::PathBuf;

use clap::Args;

use timberyard_core::ReportStore;

use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

use super::consolidate::read_report;

/// File a host report for later consolidation
#[derive(Debug, Args)]
pub struct DepositCommand {
    /// Report store directory
    #[arg(long)]
    pub store: PathBuf,

    /// Host report written by `timberyard run`
    pub report: PathBuf,
}

impl DepositCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let report = read_report(&self.report)?;
        let store = ReportStore::open(&self.store)?;
        let digest = store.deposit(&report)?;

        match cli.format {
            OutputFormat::Json => output::json(&serde_json::json!({ "key": digest }))?,
            OutputFormat::Text if !cli.quiet => {
                println!("{}", output::header("Report deposited"));
                println!("{}", output::key_value("key", &digest));
                println!(
                    "{}",
                    output::key_value(
                        "store",
                        &output::path_style().apply_to(store.root().display()).to_string()
                    )
                );
            }
            OutputFormat::Text => {}
        }
        Ok(exit_codes::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_deposit_marks_pending() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("report.json");
        std::fs::write(
            &report,
            json!({
                "meta": {
                    "repository": "git@example.com:demo.git",
                    "branch": "main",
                    "commit": {"id": {"long": "0123456789abcdef"}},
                    "arch": {"host": {"descriptor": "linux-x86_64"}}
                },
                "tasks": {}
            })
            .to_string(),
        )
        .unwrap();
        let root = temp.path().join("store");

        let cli = Cli::parse_from([
            "timberyard",
            "-q",
            "deposit",
            "--store",
            root.to_str().unwrap(),
            report.to_str().unwrap(),
        ]);
        assert_eq!(cli.execute().unwrap(), exit_codes::SUCCESS);
        assert_eq!(ReportStore::open(&root).unwrap().pending().unwrap().len(), 1);
    }

    #[test]
    fn test_deposit_requires_metadata() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("report.json");
        std::fs::write(&report, r#"{"meta": {}, "tasks": {}}"#).unwrap();

        let cli = Cli::parse_from([
            "timberyard",
            "deposit",
            "--store",
            temp.path().join("store").to_str().unwrap(),
            report.to_str().unwrap(),
        ]);
        assert!(cli.execute().is_err());
    }
}
