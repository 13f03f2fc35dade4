//! Layered configuration
//!
//! A [`Config`] holds configuration fragments grouped by [`Priority`]. Every
//! mutation recomputes two trees: the *unresolved* tree, which is the deep
//! merge of all fragments from the lowest to the highest priority, and the
//! *resolved* tree, which is the unresolved tree with every `${path}`
//! reference substituted.

pub mod defaults;
mod interpolate;
mod loader;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{ConfigError, ValueError};
use crate::value::{Value, ValuePath};

pub use defaults::{base_config, variant, variant_names, PROJECT_CONFIG_FILES, SYSTEM_CONFIG_ENV};
pub use loader::{find_project_config, load_fragment, parse_fragment, FragmentFormat};

/// Phases in execution order
pub const PHASES: [&str; 3] = ["checkout", "integrate", "publish"];

/// Provenance of a configuration fragment. Later variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Built-in defaults
    Base,
    /// Built-in variant selected per phase
    Variant,
    /// Project configuration file
    Project,
    /// System-wide configuration file
    System,
    /// Environment and detected build metadata
    Environment,
    /// Command-line arguments
    Arguments,
    /// Values derived from the configuration itself
    Computed,
}

impl Priority {
    /// All priorities, lowest first
    pub const ALL: [Priority; 7] = [
        Priority::Base,
        Priority::Variant,
        Priority::Project,
        Priority::System,
        Priority::Environment,
        Priority::Arguments,
        Priority::Computed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Base => "base",
            Priority::Variant => "variant",
            Priority::Project => "project",
            Priority::System => "system",
            Priority::Environment => "environment",
            Priority::Arguments => "arguments",
            Priority::Computed => "computed",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration with merged and resolved views
#[derive(Debug, Clone)]
pub struct Config {
    layers: BTreeMap<Priority, Vec<Value>>,
    unresolved: Value,
    resolved: Value,
}

impl Config {
    /// An empty configuration
    pub fn new() -> Self {
        Self {
            layers: BTreeMap::new(),
            unresolved: Value::object(),
            resolved: Value::object(),
        }
    }

    /// Append `fragment` to the `priority` layer and recompute.
    ///
    /// When the new fragment makes resolution fail, it is dropped again and
    /// the configuration is left as it was.
    #[instrument(skip_all, fields(layer = %priority))]
    pub fn apply(&mut self, priority: Priority, fragment: Value) -> Result<(), ConfigError> {
        self.layers.entry(priority).or_default().push(fragment);

        if let Err(err) = self.recompute() {
            if let Some(fragments) = self.layers.get_mut(&priority) {
                fragments.pop();
            }
            return Err(err);
        }

        debug!(layer = %priority, "configuration fragment applied");
        Ok(())
    }

    /// Apply a single value at `path`
    pub fn apply_value(
        &mut self,
        priority: Priority,
        path: impl Into<ValuePath>,
        value: impl Into<Value>,
    ) -> Result<(), ConfigError> {
        let mut fragment = Value::object();
        fragment.set(path, value);
        self.apply(priority, fragment)
    }

    /// Apply `path=value` assignments as one fragment of string values.
    pub fn apply_assignments<I, S>(
        &mut self,
        priority: Priority,
        assignments: I,
    ) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fragment = Value::object();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (path, value) = assignment
                .split_once('=')
                .ok_or_else(|| ConfigError::InvalidAssignment(assignment.to_string()))?;
            fragment.set(path.trim(), value);
        }
        self.apply(priority, fragment)
    }

    /// Parse `text` in the given format and apply it
    pub fn apply_str(
        &mut self,
        priority: Priority,
        text: &str,
        format: FragmentFormat,
    ) -> Result<(), ConfigError> {
        let fragment = parse_fragment(text, format, priority.as_str())?;
        self.apply(priority, fragment)
    }

    /// Load a file, choosing the format by extension, and apply it
    pub fn apply_file(&mut self, priority: Priority, path: &Path) -> Result<(), ConfigError> {
        let fragment = load_fragment(path)?;
        self.apply(priority, fragment)
    }

    /// Resolved value at `path`
    pub fn get(&self, path: impl Into<ValuePath>) -> Result<&Value, ValueError> {
        self.resolved.get(path)
    }

    /// Resolved value at `path`, or `default`
    pub fn get_or(&self, path: impl Into<ValuePath>, default: impl Into<Value>) -> Value {
        self.resolved.get_or(path, default)
    }

    /// Merge of all fragments, references left in place
    pub fn unresolved(&self) -> &Value {
        &self.unresolved
    }

    /// Merge of all fragments with references substituted
    pub fn resolved(&self) -> &Value {
        &self.resolved
    }

    /// Fragments applied at `priority`, in apply order
    pub fn layer(&self, priority: Priority) -> &[Value] {
        self.layers.get(&priority).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Give every phase task the defaults registered for its type.
    ///
    /// `tasks.defaults.<type>` is applied under `tasks.<phase>.<name>` at the
    /// base layer, so anything set explicitly for the task wins.
    pub fn expand_task_defaults(&mut self) -> Result<(), ConfigError> {
        let mut fragment = Value::object();

        for phase in PHASES {
            let tasks = self.resolved.get_or(ValuePath::from(["tasks", phase]), Value::Null);
            let Some(tasks) = tasks.as_object() else {
                continue;
            };
            for (name, task) in tasks {
                let task_type = task.get_or("type", Value::Null).to_string();
                if task_type.is_empty() {
                    continue;
                }
                if let Ok(defaults) = self
                    .unresolved
                    .get(ValuePath::from(["tasks", "defaults", task_type.as_str()]))
                {
                    debug!(phase, task = %name, task_type = %task_type, "applying task defaults");
                    fragment.set(ValuePath::from(["tasks", phase, name.as_str()]), defaults.clone());
                }
            }
        }

        self.apply(Priority::Base, fragment)
    }

    fn recompute(&mut self) -> Result<(), ConfigError> {
        let mut unresolved = Value::object();
        for fragments in self.layers.values() {
            for fragment in fragments {
                unresolved.merge(fragment);
            }
        }

        let resolved = interpolate::resolve(&unresolved)?;
        self.unresolved = unresolved;
        self.resolved = resolved;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
