//! Type-specific merging of task details across hosts

use crate::value::{Array, Value, ValuePath};

/// Folds one host's task details into the consolidated task entry.
///
/// Implementations own the `details`, `warnings` and `errors` fields of the
/// consolidated entry; both counters are reset to zero before every call.
pub trait DetailMerge: Send + Sync {
    /// Merge `source` (the host's task entry) into `target`
    fn merge(&self, host: &str, source: &Value, target: &mut Value);
}

/// Deduplicates a list of records across hosts by a set of key fields.
///
/// Matching records collect the reporting hosts in a `hosts` array. Fields
/// outside the key (such as a column) are kept from the first report.
#[derive(Debug, Clone)]
pub struct KeyedListMerge {
    source: &'static str,
    keys: &'static [&'static str],
    counting: Counting,
}

/// How a [`KeyedListMerge`] derives the task counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counting {
    /// Count entries by their `type` field: `error` and `warning`
    ByType,
    /// Every entry is a warning
    AllWarnings,
}

impl KeyedListMerge {
    pub fn new(source: &'static str, keys: &'static [&'static str], counting: Counting) -> Self {
        Self {
            source,
            keys,
            counting,
        }
    }

    /// Compiler diagnostics, matched without the column
    pub fn diagnostics() -> Self {
        Self::new(
            "details.results",
            &["type", "message", "filename", "row"],
            Counting::ByType,
        )
    }

    /// Static analysis findings
    pub fn findings() -> Self {
        Self::new(
            "details.errors",
            &["type", "message", "severity", "file", "line"],
            Counting::AllWarnings,
        )
    }

    fn same_key(&self, a: &Value, b: &Value) -> bool {
        self.keys
            .iter()
            .all(|key| a.get_or(*key, Value::Null) == b.get_or(*key, Value::Null))
    }
}

impl DetailMerge for KeyedListMerge {
    fn merge(&self, host: &str, source: &Value, target: &mut Value) {
        let mut entries: Array = target.get_or("details", Value::array()).to_array();
        let host_value = Value::from(host);

        for record in source.get_or(self.source, Value::array()).to_array() {
            let index = match entries.iter().position(|e| self.same_key(e, &record)) {
                Some(index) => index,
                None => {
                    entries.push(record);
                    entries.len() - 1
                }
            };

            let entry = &mut entries[index];
            let mut hosts = entry.get_or("hosts", Value::array()).to_array();
            if !hosts.contains(&host_value) {
                hosts.push(host_value.clone());
            }
            entry.set("hosts", hosts);
        }

        let (errors, warnings) = match self.counting {
            Counting::ByType => (
                count_type(&entries, "error"),
                count_type(&entries, "warning"),
            ),
            Counting::AllWarnings => (0, entries.len()),
        };

        target.set("details", entries);
        target.set("errors", errors);
        target.set("warnings", warnings);
    }
}

fn count_type(entries: &[Value], kind: &str) -> usize {
    entries
        .iter()
        .filter(|e| e.get_or("type", Value::Null).as_str() == Some(kind))
        .count()
}

/// Unit test results keyed by suite and test name
#[derive(Debug, Clone, Default)]
pub struct TestCaseMerge;

const ERROR_RESULT: &str = "Error";

impl DetailMerge for TestCaseMerge {
    fn merge(&self, host: &str, source: &Value, target: &mut Value) {
        for (suite, tests) in source.get_or("details.tests", Value::object()).to_object() {
            for (test, case) in tests.to_object() {
                let path = ValuePath::from(["details", suite.as_str(), test.as_str()]);
                let entry = target.entry(path);

                if entry.is_null() {
                    entry.set("name", case.get_or("name", test.as_str()));
                    entry.set("result", case.get_or("result", Value::Null));
                    entry.set("status", case.get_or("status", Value::Null));
                    entry.set("message", Value::object());
                }

                if case.get_or("result", Value::Null).as_str() == Some(ERROR_RESULT) {
                    entry.set("result", ERROR_RESULT);
                }

                if entry.get_or("status", Value::Null) != case.get_or("status", Value::Null) {
                    entry.set("status", "mixed");
                }

                let message = case.get_or("message", Value::Null).to_string();
                let message = message.trim();
                if !message.is_empty() {
                    entry.set(ValuePath::from(["message", host]), message);
                }
            }
        }

        let errors = target
            .get_or("details", Value::object())
            .to_array()
            .iter()
            .flat_map(|suite| suite.to_array())
            .filter(|case| case.get_or("result", Value::Null).as_str() == Some(ERROR_RESULT))
            .count();
        target.set("errors", errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_diagnostics_ignore_column() {
        let merge = KeyedListMerge::diagnostics();
        let mut target = Value::object();
        merge.merge(
            "hostA",
            &task(json!({"details": {"results": [
                {"type": "error", "message": "X", "filename": "f.c", "row": 10, "column": 3}
            ]}})),
            &mut target,
        );
        merge.merge(
            "hostB",
            &task(json!({"details": {"results": [
                {"type": "error", "message": "X", "filename": "f.c", "row": 10, "column": 7}
            ]}})),
            &mut target,
        );

        let details = target.get("details").unwrap().as_array().unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].get("hosts").unwrap(), &task(json!(["hostA", "hostB"])));
        assert_eq!(details[0].get("column").unwrap(), &Value::from(3));
        assert_eq!(target.get("errors").unwrap(), &Value::from(1));
        assert_eq!(target.get("warnings").unwrap(), &Value::from(0));
    }

    #[test]
    fn test_diagnostics_count_by_type() {
        let merge = KeyedListMerge::diagnostics();
        let mut target = Value::object();
        merge.merge(
            "h",
            &task(json!({"details": {"results": [
                {"type": "warning", "message": "unused", "filename": "a.c", "row": 1},
                {"type": "warning", "message": "unused", "filename": "a.c", "row": 2},
                {"type": "error", "message": "boom", "filename": "b.c", "row": 1},
                {"type": "note", "message": "here", "filename": "b.c", "row": 1}
            ]}})),
            &mut target,
        );
        assert_eq!(target.get("errors").unwrap(), &Value::from(1));
        assert_eq!(target.get("warnings").unwrap(), &Value::from(2));
    }

    #[test]
    fn test_same_host_is_listed_once() {
        let merge = KeyedListMerge::findings();
        let finding = json!({"type": "nullPointer", "message": "m", "severity": "error", "file": "x.c", "line": 4});
        let mut target = Value::object();
        merge.merge("h", &task(json!({"details": {"errors": [finding.clone(), finding]}})), &mut target);

        let details = target.get("details").unwrap().as_array().unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].get("hosts").unwrap(), &task(json!(["h"])));
        assert_eq!(target.get("warnings").unwrap(), &Value::from(1));
    }

    #[test]
    fn test_findings_distinguish_severity() {
        let merge = KeyedListMerge::findings();
        let mut target = Value::object();
        merge.merge(
            "a",
            &task(json!({"details": {"errors": [
                {"type": "t", "message": "m", "severity": "style", "file": "x.c", "line": 4}
            ]}})),
            &mut target,
        );
        merge.merge(
            "b",
            &task(json!({"details": {"errors": [
                {"type": "t", "message": "m", "severity": "warning", "file": "x.c", "line": 4}
            ]}})),
            &mut target,
        );
        assert_eq!(target.get("warnings").unwrap(), &Value::from(2));
    }

    #[test]
    fn test_unit_test_mixed_status() {
        let merge = TestCaseMerge;
        let mut target = Value::object();
        merge.merge(
            "hostA",
            &task(json!({"details": {"tests": {"Suite": {"Case": {
                "name": "Case", "status": "Ok", "result": "Ok", "message": ""
            }}}}})),
            &mut target,
        );
        merge.merge(
            "hostB",
            &task(json!({"details": {"tests": {"Suite": {"Case": {
                "name": "Case", "status": "Error", "result": "Error", "message": "  expected 1  "
            }}}}})),
            &mut target,
        );

        let case = target.get("details.Suite.Case").unwrap();
        assert_eq!(case.get("status").unwrap(), &Value::from("mixed"));
        assert_eq!(case.get("result").unwrap(), &Value::from("Error"));
        assert_eq!(case.get("message.hostB").unwrap(), &Value::from("expected 1"));
        assert!(case.get("message.hostA").is_err());
        assert_eq!(target.get("errors").unwrap(), &Value::from(1));
    }

    #[test]
    fn test_unit_test_agreement_keeps_status() {
        let merge = TestCaseMerge;
        let mut target = Value::object();
        let report = task(json!({"details": {"tests": {"S": {
            "a": {"name": "a", "status": "Ok", "result": "Ok"},
            "b": {"name": "b", "status": "Ok", "result": "Ok"}
        }}}}));
        merge.merge("x", &report, &mut target);
        merge.merge("y", &report, &mut target);
        assert_eq!(target.get("details.S.a.status").unwrap(), &Value::from("Ok"));
        assert_eq!(target.get("errors").unwrap(), &Value::from(0));
    }
}
