//! Error types for Timberyard

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using TimberyardError
pub type Result<T> = std::result::Result<T, TimberyardError>;

/// Main error type for Timberyard operations
#[derive(Debug, Error)]
pub enum TimberyardError {
    /// Value tree lookup errors
    #[error(transparent)]
    Value(#[from] ValueError),

    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Git-related errors
    #[error(transparent)]
    Git(#[from] GitError),

    /// Report consolidation errors
    #[error(transparent)]
    Consolidation(#[from] ConsolidationError),

    /// Report store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl TimberyardError {
    /// Create a generic error from a message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Value tree errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Nothing exists at the requested path
    #[error("No value found at path '{0}'")]
    NotFound(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse a configuration fragment
    #[error("Failed to parse configuration from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// A `key=value` assignment without `=`
    #[error("Invalid configuration assignment '{0}', expected key=value")]
    InvalidAssignment(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown built-in variant
    #[error("Unknown {phase} variant '{name}'")]
    UnknownVariant { phase: String, name: String },

    /// Interpolation references form a cycle
    #[error("Cyclic configuration reference: {0}")]
    CyclicReference(String),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Git-related errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Repository not found
    #[error("Git repository not found at {0}")]
    RepositoryNotFound(PathBuf),

    /// Not a git repository
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    /// Failed to open repository
    #[error("Failed to open repository: {0}")]
    OpenFailed(String),

    /// HEAD does not point to a branch
    #[error("HEAD is detached")]
    DetachedHead,

    /// Remote not found
    #[error("Remote not found: {0}")]
    RemoteNotFound(String),

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),
}

/// Report consolidation errors
#[derive(Debug, Error)]
pub enum ConsolidationError {
    /// Nothing to consolidate
    #[error("At least one report is required for consolidation")]
    NoReports,

    /// A host report is missing its task map
    #[error("Report from host '{0}' has no tasks")]
    MissingTasks(String),

    /// Two hosts disagree on the type of a task
    #[error("Task '{task}' has type '{found}' on host '{host}', expected '{expected}'")]
    TypeMismatch {
        task: String,
        host: String,
        expected: String,
        found: String,
    },

    /// Two hosts disagree on the name of a task
    #[error("Task '{task}' is named '{found}' on host '{host}', expected '{expected}'")]
    NameMismatch {
        task: String,
        host: String,
        expected: String,
        found: String,
    },
}

/// Report store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A report lacks metadata needed to file it
    #[error("Report is missing required field '{0}'")]
    MissingField(String),

    /// No reports stored under a key
    #[error("No reports stored for key {0}")]
    UnknownKey(String),

    /// Stored report could not be parsed
    #[error("Failed to parse stored report {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// IO error
    #[error("IO error in report store: {0}")]
    Io(#[from] std::io::Error),
}
