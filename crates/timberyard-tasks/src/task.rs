//! Task definitions and results

use timberyard_core::{TaskStatus, Value, ValuePath};

use crate::process::ProcessError;

/// One task of a phase as read from the resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    /// Instance name, unique within the phase
    pub name: String,
    /// Registry key of the handler, e.g. `build:cmake`
    pub task_type: String,
    pub enabled: bool,
    /// Tasks that must run before this one
    pub dependencies: Vec<String>,
    /// The full resolved task configuration
    pub config: Value,
}

impl TaskSpec {
    /// Read a task from its configuration node.
    ///
    /// Only dependencies marked true count; a missing `enabled` flag means
    /// the task is disabled.
    pub fn from_value(name: impl Into<String>, config: &Value) -> Self {
        let dependencies = config
            .get_or("dependencies", Value::object())
            .to_object()
            .into_iter()
            .filter(|(_, required)| required.to_boolean())
            .map(|(dependency, _)| dependency)
            .collect();

        Self {
            name: name.into(),
            task_type: config.get_or("type", Value::Null).to_string(),
            enabled: config.get_or("enabled", Value::Null).to_boolean(),
            dependencies,
            config: config.clone(),
        }
    }

    /// All tasks of a phase task map, in key order
    pub fn parse_phase(tasks: &Value) -> Vec<Self> {
        tasks
            .as_object()
            .map(|tasks| {
                tasks
                    .iter()
                    .map(|(name, config)| Self::from_value(name.as_str(), config))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Outcome of a task handler
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub status: TaskStatus,
    /// Last meaningful output line
    pub message: String,
    pub warnings: u64,
    pub errors: u64,
    /// Task-type specific payload
    pub details: Value,
}

impl TaskResult {
    pub fn new(status: TaskStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            warnings: 0,
            errors: 0,
            details: Value::object(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(TaskStatus::Ok, message)
    }

    /// Result whose status follows from the diagnostic counts
    pub fn from_counts(errors: u64, warnings: u64, message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::from_counts(errors, warnings),
            message: message.into(),
            warnings,
            errors,
            details: Value::object(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Record one more error, which makes the result an error
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.status = TaskStatus::Error;
        self.message = message.into();
    }

    /// Report entry for the task `spec`
    pub fn to_entry(&self, spec: &TaskSpec) -> Value {
        let mut entry = Value::object();
        entry.set("type", spec.task_type.as_str());
        entry.set("name", spec.name.as_str());
        entry.set("message", self.message.as_str());
        entry.set("warnings", self.warnings);
        entry.set("errors", self.errors);
        entry.set("status", self.status);
        entry.set("details", self.details.clone());
        entry.set("config", spec.config.clone());
        entry
    }
}

impl Default for TaskResult {
    fn default() -> Self {
        Self::ok("-")
    }
}

/// Failure raised inside a task handler.
///
/// The scheduler turns a fault into an error entry for the task; it never
/// aborts the phase.
#[derive(Debug, thiserror::Error)]
pub enum TaskFault {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing task setting: {0}")]
    MissingSetting(String),

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl TaskFault {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// A setting that must be present and non-empty
pub fn required_setting(config: &Value, path: &str) -> Result<String, TaskFault> {
    let value = config.get_or(ValuePath::parse(path), Value::Null).to_string();
    if value.trim().is_empty() {
        return Err(TaskFault::MissingSetting(path.to_string()));
    }
    Ok(value)
}

/// A setting rendered as a string, empty when absent
pub fn setting(config: &Value, path: &str) -> String {
    config.get_or(ValuePath::parse(path), Value::Null).to_string()
}
