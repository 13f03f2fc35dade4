//! Shared types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Outcome of a task, ordered from best to worst
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Ok,
    Warning,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Parse a status string. Anything unrecognized counts as an error.
    pub fn parse(status: &str) -> Self {
        match status.trim() {
            "ok" => Self::Ok,
            "warning" => Self::Warning,
            _ => Self::Error,
        }
    }

    /// Status implied by diagnostic counts
    pub fn from_counts(errors: u64, warnings: u64) -> Self {
        if errors > 0 {
            Self::Error
        } else if warnings > 0 {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    /// The worse of two statuses
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    pub fn is_error(&self) -> bool {
        *self == Self::Error
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TaskStatus> for Value {
    fn from(status: TaskStatus) -> Self {
        Value::from(status.as_str())
    }
}
