//! Built-in task types
//!
//! | Type | Tool |
//! |---|---|
//! | `build:cmake` | cmake, make |
//! | `test:googletest` | a GoogleTest binary |
//! | `analysis:cppcheck` | cppcheck |
//! | `doc:doxygen` | doxygen |
//! | `publish:rsync` | ssh, rsync |
//!
//! Every task accepts an optional `timeout` setting in seconds that bounds
//! each process it starts.

mod cmake;
mod cppcheck;
mod doxygen;
mod googletest;
mod rsync;

use std::time::Duration;

use timberyard_core::Value;

use crate::process::ProcessOptions;
use crate::registry::TaskRegistry;

pub use cmake::{parse_diagnostics, CmakeTask};
pub use cppcheck::{parse_findings, CppcheckTask};
pub use doxygen::DoxygenTask;
pub use googletest::{parse_report, GoogleTestTask};
pub use rsync::RsyncTask;

/// Register every built-in task type
pub fn register_all(registry: &mut TaskRegistry) {
    registry.register(CmakeTask::TYPE, CmakeTask);
    registry.register(GoogleTestTask::TYPE, GoogleTestTask);
    registry.register(CppcheckTask::TYPE, CppcheckTask);
    registry.register(DoxygenTask::TYPE, DoxygenTask);
    registry.register(RsyncTask::TYPE, RsyncTask);
}

/// Process options taken from a task configuration
pub(crate) fn process_options(config: &Value) -> ProcessOptions {
    let seconds = config.get_or("timeout", Value::Null).to_number();
    ProcessOptions {
        timeout: (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds)),
        ..Default::default()
    }
}

/// Program setting at `path` with a fallback program name
pub(crate) fn binary(config: &Value, path: &str, fallback: &str) -> String {
    let binary = crate::task::setting(config, path);
    if binary.trim().is_empty() {
        fallback.to_string()
    } else {
        binary
    }
}
