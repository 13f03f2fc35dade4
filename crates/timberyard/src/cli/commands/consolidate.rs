//! Consolidate command - merge host reports of one commit

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgGroup, Args};
use tracing::{debug, error};

use timberyard_core::{consolidate, ReportStore, Value};

use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

/// Merge host reports into a consolidated report
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["reports", "store"])))]
pub struct ConsolidateCommand {
    /// Host report files
    pub reports: Vec<PathBuf>,

    /// Process every pending consolidation of a report store
    #[arg(long, conflicts_with_all = ["reports", "output"])]
    pub store: Option<PathBuf>,

    /// Write the consolidated report to a file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl ConsolidateCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        match &self.store {
            Some(root) => self.consolidate_store(root, cli),
            None => self.consolidate_files(cli),
        }
    }

    fn consolidate_files(&self, cli: &Cli) -> anyhow::Result<i32> {
        let reports = read_reports(&self.reports)?;
        let consolidated = consolidate(&reports)?;

        match &self.output {
            Some(path) => {
                write_json(path, &consolidated)?;
                if !cli.quiet && cli.format == OutputFormat::Text {
                    output::success(&format!(
                        "Consolidated {} host report{} into {}",
                        reports.len(),
                        if reports.len() == 1 { "" } else { "s" },
                        output::path_style().apply_to(path.display())
                    ));
                }
            }
            None => output::json(&consolidated)?,
        }
        Ok(exit_codes::SUCCESS)
    }

    fn consolidate_store(&self, root: &Path, cli: &Cli) -> anyhow::Result<i32> {
        let store = ReportStore::open(root)?;
        let pending = store.pending()?;
        let text = !cli.quiet && cli.format == OutputFormat::Text;

        if pending.is_empty() {
            if text {
                output::info("Nothing to consolidate");
            }
            return Ok(exit_codes::SUCCESS);
        }

        let mut written = Vec::new();
        let mut failed = Vec::new();
        for entry in pending {
            if !store.claim(&entry.digest)? {
                debug!(digest = %entry.digest, "already claimed, skipping");
                continue;
            }

            match consolidate_entry(&store, &entry.digest) {
                Ok(path) => {
                    if text {
                        output::success(&format!(
                            "{} {}",
                            short_digest(&entry.digest),
                            output::path_style().apply_to(path.display())
                        ));
                    }
                    written.push(path.display().to_string());
                }
                Err(e) => {
                    error!(digest = %entry.digest, error = %format!("{e:#}"), "consolidation failed");
                    output::error(&format!("{}: {e:#}", short_digest(&entry.digest)));
                    store.release(&entry.digest)?;
                    failed.push(entry.digest);
                }
            }
        }

        if cli.format == OutputFormat::Json {
            output::json(&serde_json::json!({
                "consolidated": written,
                "failed": failed,
            }))?;
        }

        Ok(if failed.is_empty() {
            exit_codes::SUCCESS
        } else {
            exit_codes::ERROR
        })
    }
}

fn consolidate_entry(store: &ReportStore, digest: &str) -> anyhow::Result<PathBuf> {
    let reports = store.host_reports(digest)?;
    let consolidated = consolidate(&reports)?;
    Ok(store.write_consolidated(digest, &consolidated)?)
}

/// Read host reports keyed by host descriptor, falling back to the file name
fn read_reports(paths: &[PathBuf]) -> anyhow::Result<BTreeMap<String, Value>> {
    let mut reports = BTreeMap::new();
    for path in paths {
        let report = read_report(path)?;
        let host = match report.get_or("meta.arch.host.descriptor", Value::Null) {
            Value::String(host) if !host.is_empty() => host,
            _ => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        if reports.insert(host.clone(), report).is_some() {
            anyhow::bail!("more than one report for host '{host}'");
        }
    }
    Ok(reports)
}

pub(super) fn read_report(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid report {}", path.display()))
}

fn write_json(path: &Path, value: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)? + "\n")
        .with_context(|| format!("failed to write {}", path.display()))
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
