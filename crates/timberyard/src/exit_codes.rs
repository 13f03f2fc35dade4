//! Process exit codes

/// Every phase ran and no task reported an error
pub const SUCCESS: i32 = 0;

/// Fatal error: configuration, scheduling, consolidation or IO
pub const ERROR: i32 = 1;

/// The run completed but at least one task ended in error
pub const TASK_ERROR: i32 = 2;
