//! Timberyard Git - Repository metadata for build reports
//!
//! This crate reads the repository URL, branch, head commit and the commits
//! since the last good build from a working copy.

mod history;
mod metadata;
mod repository;
pub mod types;

pub use metadata::{BuildMetadata, TIMESTAMP_FORMAT};
pub use repository::{GitRepo, Result};
pub use types::CommitInfo;
