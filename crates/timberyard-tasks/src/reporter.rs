//! Phase execution reporting

use std::sync::Mutex;
use std::time::Duration;

use timberyard_core::TaskStatus;

/// Events emitted while a phase runs
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A phase is starting with its tasks in execution order
    PhaseStarted { phase: String, order: Vec<String> },
    /// A task is starting
    Started {
        phase: String,
        name: String,
        task_type: String,
    },
    /// A disabled task was passed over
    Skipped { phase: String, name: String },
    /// A task handler returned a result
    Completed {
        phase: String,
        name: String,
        status: TaskStatus,
        message: String,
        duration: Duration,
    },
    /// A task handler failed; the task is reported as an error
    Faulted {
        phase: String,
        name: String,
        error: String,
        duration: Duration,
    },
    /// All tasks of the phase ran
    PhaseCompleted {
        phase: String,
        executed: usize,
        skipped: usize,
        failed: usize,
        duration: Duration,
    },
}

/// Receives progress of a running phase
pub trait TaskReporter: Send + Sync {
    fn report(&self, event: &TaskEvent);
}

/// Reporter that forwards events to `tracing`
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::PhaseStarted { phase, order } => {
                tracing::info!(phase = %phase, order = %order.join(", "), "phase started");
            }
            TaskEvent::Started {
                phase,
                name,
                task_type,
            } => {
                tracing::info!(phase = %phase, task = %name, task_type = %task_type, "task started");
            }
            TaskEvent::Skipped { phase, name } => {
                tracing::info!(phase = %phase, task = %name, "task disabled, skipping");
            }
            TaskEvent::Completed {
                phase,
                name,
                status,
                message,
                duration,
            } => {
                tracing::info!(
                    phase = %phase,
                    task = %name,
                    status = %status,
                    message = %message,
                    duration_secs = duration.as_secs_f64(),
                    "task completed"
                );
            }
            TaskEvent::Faulted {
                phase,
                name,
                error,
                duration,
            } => {
                tracing::error!(
                    phase = %phase,
                    task = %name,
                    error = %error,
                    duration_secs = duration.as_secs_f64(),
                    "task failed"
                );
            }
            TaskEvent::PhaseCompleted {
                phase,
                executed,
                skipped,
                failed,
                duration,
            } => {
                tracing::info!(
                    phase = %phase,
                    executed,
                    skipped,
                    failed,
                    duration_secs = duration.as_secs_f64(),
                    "phase completed"
                );
            }
        }
    }
}

/// Reporter that keeps every event, for inspection in tests
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
