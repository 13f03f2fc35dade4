//! Run command - execute the phases and write the host report

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use tracing::{info, warn};

use timberyard_core::{Config, Value, ValuePath, PHASES};
use timberyard_tasks::{PhaseRunner, TaskEvent, TaskRegistry, TaskReporter, TracingReporter};

use crate::bootstrap::bootstrap;
use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

use super::BootstrapArgs;

/// Run the checkout, integrate and publish phases
#[derive(Debug, Args)]
pub struct RunCommand {
    #[command(flatten)]
    pub bootstrap: BootstrapArgs,

    /// Print the resolved configuration before running
    #[arg(long)]
    pub print_config: bool,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<i32> {
        let config = bootstrap(&self.bootstrap.options())?;
        if self.print_config {
            output::json(config.resolved())?;
        }

        prepare_output(
            &path_setting(&config, "meta.input"),
            &path_setting(&config, "meta.output"),
        )?;

        let reporter: Arc<dyn TaskReporter> = if cli.quiet || cli.format == OutputFormat::Json {
            Arc::new(TracingReporter)
        } else {
            Arc::new(ConsoleReporter::new(cli.verbose))
        };
        let runner = PhaseRunner::new(Arc::new(TaskRegistry::with_builtins()), reporter);

        let summary = run_phases(&config, &runner).await?;

        if cli.format == OutputFormat::Json {
            output::json(&serde_json::json!({
                "id": config.get_or("meta.id", Value::Null).to_string(),
                "report": summary.report_path.display().to_string(),
                "tasks": summary.report.get_or("tasks", Value::object()).to_object().len(),
                "failed_phases": summary.failed_phases,
            }))?;
        } else if !cli.quiet {
            println!();
            println!(
                "{}",
                output::key_value(
                    "report",
                    &output::path_style()
                        .apply_to(summary.report_path.display())
                        .to_string()
                )
            );
            if summary.failed_phases.is_empty() {
                output::success("All tasks completed");
            } else {
                output::warning(&format!(
                    "Tasks failed in phase{} {}",
                    if summary.failed_phases.len() == 1 { "" } else { "s" },
                    summary.failed_phases.join(", ")
                ));
            }
        }

        Ok(if summary.failed_phases.is_empty() {
            exit_codes::SUCCESS
        } else {
            exit_codes::TASK_ERROR
        })
    }
}

/// Result of running every phase
#[derive(Debug)]
struct RunSummary {
    /// Combined host report, `{meta, tasks}`
    report: Value,
    report_path: PathBuf,
    failed_phases: Vec<&'static str>,
}

/// Run all phases, writing each phase report and the combined host report
async fn run_phases(config: &Config, runner: &PhaseRunner) -> anyhow::Result<RunSummary> {
    let meta = config.get_or("meta", Value::object());
    let mut report = Value::object();
    report.set("meta", meta.clone());
    report.set("tasks", Value::object());
    let mut failed_phases = Vec::new();

    for phase in PHASES {
        let tasks = config.get_or(ValuePath::from(["tasks", phase]), Value::object());
        let outcome = runner.run_phase(phase, &tasks).await?;

        let mut phase_report = outcome.report.clone();
        phase_report.set("meta", meta.clone());
        write_report(
            &path_setting(config, &format!("meta.results.{phase}")),
            &phase_report,
        )?;

        for (name, entry) in outcome.tasks().to_object() {
            let path = ValuePath::from(["tasks", name.as_str()]);
            if report.contains(&path) {
                warn!(phase, task = %name, "task name already reported by an earlier phase, replacing");
            }
            report.set(path, entry);
        }
        if outcome.failed {
            failed_phases.push(phase);
        }
    }

    let report_path = path_setting(config, "meta.results.report");
    write_report(&report_path, &report)?;
    info!(
        path = %report_path.display(),
        failed_phases = failed_phases.len(),
        "host report written"
    );

    Ok(RunSummary {
        report,
        report_path,
        failed_phases,
    })
}

/// Empty the output directory, refusing to touch the sources
fn prepare_output(input: &Path, output: &Path) -> anyhow::Result<()> {
    if input.starts_with(output) {
        anyhow::bail!(
            "output directory {} would remove the input directory {}",
            output.display(),
            input.display()
        );
    }
    if output.exists() {
        std::fs::remove_dir_all(output)
            .with_context(|| format!("failed to clean output directory {}", output.display()))?;
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;
    Ok(())
}

fn write_report(path: &Path, report: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content + "\n")
        .with_context(|| format!("failed to write report {}", path.display()))?;
    Ok(())
}

fn path_setting(config: &Config, path: &str) -> PathBuf {
    PathBuf::from(config.get_or(path, Value::Null).to_string())
}

/// Console reporter printing one line per task
struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::PhaseStarted { phase, order } => {
                if order.is_empty() && !self.verbose {
                    return;
                }
                println!();
                println!("{}", output::header(phase));
            }
            TaskEvent::Started {
                name, task_type, ..
            } => {
                if self.verbose {
                    println!(
                        "  {} {} {}",
                        style("▸").dim(),
                        style(name).bold(),
                        style(format!("({task_type})")).dim()
                    );
                }
            }
            TaskEvent::Skipped { name, .. } => {
                if self.verbose {
                    println!(
                        "  {} {} {}",
                        style("○").yellow(),
                        style(name).yellow(),
                        style("(disabled)").dim()
                    );
                }
            }
            TaskEvent::Completed {
                name,
                status,
                message,
                duration,
                ..
            } => {
                let time = style(format!("{:.1}s", duration.as_secs_f64())).dim();
                match status {
                    timberyard_core::TaskStatus::Ok => {
                        println!("  {} {} {}", style("✓").green(), style(name).green(), time);
                    }
                    timberyard_core::TaskStatus::Warning => {
                        println!(
                            "  {} {} {} {}",
                            style("!").yellow(),
                            style(name).yellow(),
                            time,
                            style(message).dim()
                        );
                    }
                    timberyard_core::TaskStatus::Error => {
                        println!(
                            "  {} {} {} {}",
                            style("✗").red(),
                            style(name).red(),
                            time,
                            style(message).red().dim()
                        );
                    }
                }
            }
            TaskEvent::Faulted {
                name,
                error,
                duration,
                ..
            } => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(name).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(error).red().dim()
                );
            }
            TaskEvent::PhaseCompleted {
                executed,
                skipped,
                failed,
                duration,
                ..
            } => {
                if self.verbose {
                    println!(
                        "  {} {} ran, {} skipped, {} failed ({:.1}s)",
                        style("─").dim(),
                        executed,
                        skipped,
                        failed,
                        duration.as_secs_f64()
                    );
                }
            }
        }
    }
}
