//! Phase runner: executes the tasks of one phase in dependency order

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use timberyard_core::{TaskStatus, Value, ValuePath};

use crate::dag::{DagError, ExecutionPlan};
use crate::registry::{TaskHandler, TaskRegistry};
use crate::reporter::{TaskEvent, TaskReporter};
use crate::task::{TaskFault, TaskResult, TaskSpec};

/// Errors that abort a whole phase
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Unknown task type '{task_type}' for task '{task}' in phase '{phase}'")]
    UnknownTaskType {
        phase: String,
        task: String,
        task_type: String,
    },

    #[error(transparent)]
    Dag(#[from] DagError),
}

/// Report of one phase
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutcome {
    /// `{tasks: {<name>: <entry>}}`
    pub report: Value,
    /// At least one task ended with status error
    pub failed: bool,
}

impl PhaseOutcome {
    /// Task entries by name
    pub fn tasks(&self) -> Value {
        self.report.get_or("tasks", Value::object())
    }
}

/// Runs phases sequentially through a task registry
pub struct PhaseRunner {
    registry: Arc<TaskRegistry>,
    reporter: Arc<dyn TaskReporter>,
}

impl PhaseRunner {
    pub fn new(registry: Arc<TaskRegistry>, reporter: Arc<dyn TaskReporter>) -> Self {
        Self { registry, reporter }
    }

    /// Run every enabled task of `tasks` (the phase task map).
    ///
    /// Disabled tasks get no report entry. A handler fault becomes an error
    /// entry and the remaining tasks still run. Unknown task types and
    /// dependency problems are detected before anything runs.
    #[instrument(skip(self, tasks), fields(phase = %phase))]
    pub async fn run_phase(&self, phase: &str, tasks: &Value) -> Result<PhaseOutcome, SchedulerError> {
        let start = Instant::now();
        let specs = TaskSpec::parse_phase(tasks);
        let plan = ExecutionPlan::build(&specs)?;

        let mut handlers: HashMap<&str, Arc<dyn TaskHandler>> = HashMap::new();
        for spec in specs.iter().filter(|s| s.enabled) {
            let handler = self.registry.resolve(&spec.task_type).ok_or_else(|| {
                SchedulerError::UnknownTaskType {
                    phase: phase.to_string(),
                    task: spec.name.clone(),
                    task_type: spec.task_type.clone(),
                }
            })?;
            handlers.insert(spec.name.as_str(), handler);
        }

        self.reporter.report(&TaskEvent::PhaseStarted {
            phase: phase.to_string(),
            order: plan.order().to_vec(),
        });

        let by_name: HashMap<&str, &TaskSpec> =
            specs.iter().map(|s| (s.name.as_str(), s)).collect();
        let mut report = Value::object();
        report.set("tasks", Value::object());
        let mut skipped = 0;
        let mut failed = 0;

        for name in plan.order() {
            let Some(spec) = by_name.get(name.as_str()) else {
                continue;
            };
            let Some(handler) = handlers.get(name.as_str()) else {
                skipped += 1;
                self.reporter.report(&TaskEvent::Skipped {
                    phase: phase.to_string(),
                    name: name.clone(),
                });
                continue;
            };

            let result = self.run_task(phase, spec, handler.clone()).await;
            if result.status.is_error() {
                failed += 1;
            }
            report.set(ValuePath::from(["tasks", name.as_str()]), result.to_entry(spec));
        }

        let executed = handlers.len();
        self.reporter.report(&TaskEvent::PhaseCompleted {
            phase: phase.to_string(),
            executed,
            skipped,
            failed,
            duration: start.elapsed(),
        });
        info!(executed, skipped, failed, "phase finished");

        Ok(PhaseOutcome {
            report,
            failed: failed > 0,
        })
    }

    async fn run_task(&self, phase: &str, spec: &TaskSpec, handler: Arc<dyn TaskHandler>) -> TaskResult {
        let start = Instant::now();
        self.reporter.report(&TaskEvent::Started {
            phase: phase.to_string(),
            name: spec.name.clone(),
            task_type: spec.task_type.clone(),
        });

        // a panicking handler is reported like a fault
        let config = spec.config.clone();
        let outcome = match tokio::spawn(async move { handler.run(&config).await }).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(TaskFault::other(format!(
                "task panicked: {}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(TaskFault::other(e.to_string())),
        };

        match outcome {
            Ok(result) => {
                self.reporter.report(&TaskEvent::Completed {
                    phase: phase.to_string(),
                    name: spec.name.clone(),
                    status: result.status,
                    message: result.message.clone(),
                    duration: start.elapsed(),
                });
                result
            }
            Err(fault) => {
                let error = fault.to_string();
                warn!(task = %spec.name, error = %error, "task faulted");
                self.reporter.report(&TaskEvent::Faulted {
                    phase: phase.to_string(),
                    name: spec.name.clone(),
                    error: error.clone(),
                    duration: start.elapsed(),
                });

                let mut details = Value::object();
                details.set("exception", error.as_str());
                TaskResult {
                    status: TaskStatus::Error,
                    message: error,
                    warnings: 0,
                    errors: 1,
                    details,
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
