//! Folding host reports into one consolidated report

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::ConsolidationError;
use crate::types::TaskStatus;
use crate::value::{unique, Value, ValuePath};

use super::merge::{DetailMerge, KeyedListMerge, TestCaseMerge};

/// Meta fields copied from the first host report
pub const SHARED_META_FIELDS: [&str; 4] = ["project", "repository", "branch", "commit"];

/// Consolidates host reports, choosing a detail merge by task type
pub struct Consolidator {
    mergers: HashMap<String, Arc<dyn DetailMerge>>,
}

impl Consolidator {
    /// Consolidator that knows the built-in task types
    pub fn new() -> Self {
        let mut consolidator = Self::empty();
        consolidator.register("build:cmake", KeyedListMerge::diagnostics());
        consolidator.register("analysis:cppcheck", KeyedListMerge::findings());
        consolidator.register("test:googletest", TestCaseMerge);
        consolidator
    }

    /// Consolidator without detail merges
    pub fn empty() -> Self {
        Self {
            mergers: HashMap::new(),
        }
    }

    /// Register the detail merge used for `task_type`
    pub fn register<M: DetailMerge + 'static>(&mut self, task_type: impl Into<String>, merge: M) {
        self.mergers.insert(task_type.into(), Arc::new(merge));
    }

    /// Task types with a registered detail merge
    pub fn task_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.mergers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Fold `reports`, keyed by host descriptor, into one report.
    ///
    /// Shared meta fields come from the first host in descriptor order; a
    /// host that disagrees is logged and otherwise ignored.
    #[instrument(skip_all, fields(hosts = reports.len()))]
    pub fn consolidate(
        &self,
        reports: &BTreeMap<String, Value>,
    ) -> Result<Value, ConsolidationError> {
        let (first_host, first) = reports.iter().next().ok_or(ConsolidationError::NoReports)?;

        let mut consolidated = Value::object();
        for field in SHARED_META_FIELDS {
            let path = ValuePath::from(["meta", field]);
            consolidated.set(path.clone(), first.get_or(path, Value::Null));
        }

        let mut buildgap = Vec::new();
        let mut tasks = Value::object();

        for (host, report) in reports {
            for field in SHARED_META_FIELDS {
                let path = ValuePath::from(["meta", field]);
                if report.get_or(&path, Value::Null) != first.get_or(&path, Value::Null) {
                    warn!(
                        host = %host,
                        reference = %first_host,
                        field,
                        "host report metadata disagrees, keeping reference host value"
                    );
                }
            }

            consolidated.set(
                ValuePath::from(["meta", "archs", host.as_str()]),
                report.get_or("meta.arch", Value::Null),
            );
            buildgap.extend(report.get_or("meta.buildgap", Value::Null).to_array());

            let host_tasks = report
                .get("tasks")
                .ok()
                .and_then(Value::as_object)
                .ok_or_else(|| ConsolidationError::MissingTasks(host.clone()))?;

            for (name, task) in host_tasks {
                self.fold_task(host, name, task, tasks.entry([name.as_str()]))?;
            }
        }

        unique(&mut buildgap);
        consolidated.set("meta.buildgap", buildgap);
        consolidated.set(
            "meta.hosts",
            reports.keys().map(Value::from).collect::<Value>(),
        );
        consolidated.set("tasks", tasks);

        debug!("reports consolidated");
        Ok(consolidated)
    }

    fn fold_task(
        &self,
        host: &str,
        key: &str,
        task: &Value,
        entry: &mut Value,
    ) -> Result<(), ConsolidationError> {
        let task_type = task.get_or("type", Value::Null).to_string();
        let task_name = task.get_or("name", Value::Null).to_string();

        if entry.is_null() {
            entry.set("type", task_type.as_str());
            entry.set("name", task_name.as_str());
            entry.set("status.consolidated", TaskStatus::Ok);
        }

        let expected_type = entry.get_or("type", Value::Null).to_string();
        if expected_type != task_type {
            return Err(ConsolidationError::TypeMismatch {
                task: key.to_string(),
                host: host.to_string(),
                expected: expected_type,
                found: task_type,
            });
        }

        let expected_name = entry.get_or("name", Value::Null).to_string();
        if expected_name != task_name {
            return Err(ConsolidationError::NameMismatch {
                task: key.to_string(),
                host: host.to_string(),
                expected: expected_name,
                found: task_name,
            });
        }

        let host_status = TaskStatus::parse(&task.get_or("status", Value::Null).to_string());
        let running = TaskStatus::parse(&entry.get_or("status.consolidated", "ok").to_string());
        entry.set("status.consolidated", running.worst(host_status));
        entry.set(ValuePath::from(["status", host]), host_status);

        let message = task.get_or("message", Value::Null).to_string();
        let message = message.trim();
        if !message.is_empty() {
            entry.set(ValuePath::from(["message", host]), message);
        }

        entry.set("warnings", 0);
        entry.set("errors", 0);

        if let Some(merge) = self.mergers.get(&task_type) {
            merge.merge(host, task, entry);
        }
        Ok(())
    }
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Consolidate with the built-in detail merges
pub fn consolidate(reports: &BTreeMap<String, Value>) -> Result<Value, ConsolidationError> {
    Consolidator::new().consolidate(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(host: &str, tasks: serde_json::Value) -> Value {
        Value::from(json!({
            "meta": {
                "project": "demo",
                "repository": "git@example.com:demo.git",
                "branch": "main",
                "commit": {"id": {"long": "abcdef0123", "short": "abcdef0"}},
                "arch": {"host": {"descriptor": host, "os": "linux"}},
                "buildgap": [{"id": "abcdef0123"}]
            },
            "tasks": tasks
        }))
    }

    fn reports(entries: Vec<(&str, serde_json::Value)>) -> BTreeMap<String, Value> {
        entries
            .into_iter()
            .map(|(host, tasks)| (host.to_string(), report(host, tasks)))
            .collect()
    }

    #[test]
    fn test_no_reports() {
        let err = consolidate(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ConsolidationError::NoReports));
    }

    #[test]
    fn test_meta_is_collected() {
        let input = reports(vec![("hostA", json!({})), ("hostB", json!({}))]);
        let out = consolidate(&input).unwrap();

        assert_eq!(out.get("meta.project").unwrap(), &Value::from("demo"));
        assert_eq!(out.get("meta.commit.id.short").unwrap(), &Value::from("abcdef0"));
        assert_eq!(
            out.get("meta.archs.hostB.host.descriptor").unwrap(),
            &Value::from("hostB")
        );
        assert_eq!(out.get("meta.buildgap").unwrap().as_array().unwrap().len(), 1);
        assert_eq!(out.get("meta.hosts").unwrap(), &Value::from(json!(["hostA", "hostB"])));
    }

    #[test]
    fn test_status_is_worst_of_hosts() {
        let cases = [
            (["ok", "ok", "ok"], "ok"),
            (["ok", "warning", "ok"], "warning"),
            (["warning", "ok", "error"], "error"),
            (["ok", "bogus", "ok"], "error"),
        ];

        for (statuses, expected) in cases {
            let input = reports(vec![
                ("a", json!({"t": {"type": "x", "name": "t", "status": statuses[0]}})),
                ("b", json!({"t": {"type": "x", "name": "t", "status": statuses[1]}})),
                ("c", json!({"t": {"type": "x", "name": "t", "status": statuses[2]}})),
            ]);
            let out = consolidate(&input).unwrap();
            assert_eq!(
                out.get("tasks.t.status.consolidated").unwrap(),
                &Value::from(expected),
                "{statuses:?}"
            );
        }
    }

    #[test]
    fn test_per_host_status_and_message() {
        let input = reports(vec![
            ("a", json!({"t": {"type": "x", "name": "t", "status": "ok", "message": "  done \n"}})),
            ("b", json!({"t": {"type": "x", "name": "t", "status": "weird", "message": "   "}})),
        ]);
        let out = consolidate(&input).unwrap();
        assert_eq!(out.get("tasks.t.status.a").unwrap(), &Value::from("ok"));
        assert_eq!(out.get("tasks.t.status.b").unwrap(), &Value::from("error"));
        assert_eq!(out.get("tasks.t.message.a").unwrap(), &Value::from("done"));
        assert!(out.get("tasks.t.message.b").is_err());
        assert_eq!(out.get("tasks.t.warnings").unwrap(), &Value::from(0));
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let input = reports(vec![
            ("a", json!({"t": {"type": "build:cmake", "name": "t", "status": "ok"}})),
            ("b", json!({"t": {"type": "doc:doxygen", "name": "t", "status": "ok"}})),
        ]);
        let err = consolidate(&input).unwrap_err();
        assert!(matches!(err, ConsolidationError::TypeMismatch { .. }));
    }

    #[test]
    fn test_name_mismatch_is_fatal() {
        let input = reports(vec![
            ("a", json!({"t": {"type": "x", "name": "one", "status": "ok"}})),
            ("b", json!({"t": {"type": "x", "name": "two", "status": "ok"}})),
        ]);
        let err = consolidate(&input).unwrap_err();
        assert!(matches!(err, ConsolidationError::NameMismatch { .. }));
    }

    #[test]
    fn test_missing_tasks_is_fatal() {
        let mut input = BTreeMap::new();
        input.insert("a".to_string(), Value::from(json!({"meta": {}})));
        let err = consolidate(&input).unwrap_err();
        assert!(matches!(err, ConsolidationError::MissingTasks(_)));
    }

    #[test]
    fn test_build_diagnostics_deduplicated_across_hosts() {
        let input = reports(vec![
            (
                "hostA",
                json!({"build": {"type": "build:cmake", "name": "build", "status": "error",
                    "details": {"results": [
                        {"type": "error", "message": "X", "filename": "f.c", "row": 10, "column": 3}
                    ]}}}),
            ),
            (
                "hostB",
                json!({"build": {"type": "build:cmake", "name": "build", "status": "error",
                    "details": {"results": [
                        {"type": "error", "message": "X", "filename": "f.c", "row": 10, "column": 7}
                    ]}}}),
            ),
        ]);

        let out = consolidate(&input).unwrap();
        let details = out.get("tasks.build.details").unwrap().as_array().unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].get("hosts").unwrap(), &Value::from(json!(["hostA", "hostB"])));
        assert_eq!(out.get("tasks.build.errors").unwrap(), &Value::from(1));
    }

    #[test]
    fn test_unregistered_type_has_zero_counts() {
        let mut consolidator = Consolidator::empty();
        consolidator.register("test:googletest", TestCaseMerge);
        assert_eq!(consolidator.task_types(), vec!["test:googletest"]);

        let input = reports(vec![(
            "a",
            json!({"b": {"type": "build:cmake", "name": "b", "status": "error", "errors": 4,
                "details": {"results": [{"type": "error", "message": "m", "filename": "f", "row": 1}]}}}),
        )]);
        let out = consolidator.consolidate(&input).unwrap();
        assert_eq!(out.get("tasks.b.errors").unwrap(), &Value::from(0));
        assert!(out.get("tasks.b.details").is_err());
    }
}
