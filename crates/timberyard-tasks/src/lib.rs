//! Timberyard Tasks - Phase execution engine
//!
//! This crate orders the tasks of a phase by their declared dependencies,
//! runs them through an injected registry of task handlers, and assembles
//! the phase report. It also ships the built-in CI tasks (CMake builds,
//! GoogleTest, cppcheck, Doxygen and rsync publishing) together with the
//! subprocess primitive they share.

pub mod builtin;
pub mod dag;
pub mod output;
pub mod process;
pub mod registry;
pub mod reporter;
pub mod scheduler;
pub mod task;

pub use dag::{DagError, ExecutionPlan};
pub use process::{LineKind, ProcessError, ProcessOptions, ProcessOutput};
pub use registry::{TaskHandler, TaskRegistry};
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TracingReporter};
pub use scheduler::{PhaseOutcome, PhaseRunner, SchedulerError};
pub use task::{TaskFault, TaskResult, TaskSpec};
