//! Timberyard Core - Data model and configuration for the Timberyard CI runner
//!
//! This crate provides the dynamic value tree shared by configuration and
//! reports, the layered configuration resolver, report consolidation across
//! build hosts, and the error types used throughout the workspace.

pub mod config;
pub mod error;
pub mod report;
pub mod types;
pub mod value;

pub use config::{Config, FragmentFormat, Priority, PHASES};
pub use error::{
    ConfigError, ConsolidationError, GitError, Result, StoreError, TimberyardError, ValueError,
};
pub use report::{consolidate, Consolidator, ReportKey, ReportStore};
pub use types::TaskStatus;
pub use value::{Object, Value, ValuePath};
