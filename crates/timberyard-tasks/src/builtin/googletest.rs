//! `test:googletest`: run a GoogleTest binary and collect its JSON report

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};

use timberyard_core::{TaskStatus, Value, ValuePath};

use crate::output::{process_record, task_message};
use crate::process::{self, LineKind, ProcessOutput};
use crate::registry::TaskHandler;
use crate::task::{required_setting, setting, TaskFault, TaskResult};

use super::process_options;

/// GoogleTest runner
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleTestTask;

impl GoogleTestTask {
    pub const TYPE: &'static str = "test:googletest";
}

/// Test cases and outline read from a GoogleTest JSON report
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    /// `<suite>.<test>` → `{name, status, result, message, time}`
    pub tests: Value,
    /// Totals for the run (`all`) and per suite (`details`)
    pub outline: Value,
    /// Number of failed test cases
    pub failed: u64,
}

#[async_trait]
impl TaskHandler for GoogleTestTask {
    async fn run(&self, config: &Value) -> Result<TaskResult, TaskFault> {
        let binary = required_setting(config, "binary")?;
        let report_path = PathBuf::from(required_setting(config, "output")?);
        let report_dir = report_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&report_dir).await?;

        let working_dir = match setting(config, "working_dir") {
            dir if !dir.is_empty() && Path::new(&dir).is_dir() => PathBuf::from(dir),
            _ => report_dir,
        };

        let filter = match setting(config, "filter") {
            filter if filter.is_empty() => "*".to_string(),
            filter => filter,
        };
        let arguments = vec![
            format!("--gtest_output=json:{}", report_path.display()),
            format!("--gtest_filter={filter}"),
        ];

        let mut output =
            process::run(&binary, &arguments, &working_dir, &process_options(config)).await?;
        classify_lines(&mut output);

        let mut details = Value::object();
        details.set("googletest", process_record(&output));

        let report = match tokio::fs::read_to_string(&report_path).await {
            Ok(content) => parse_report(&content)?,
            Err(e) => {
                warn!(path = %report_path.display(), error = %e, "test report missing");
                let mut result = TaskResult::new(TaskStatus::Error, task_message(&output));
                result.errors = 1;
                return Ok(result.with_details(details));
            }
        };

        info!(failed = report.failed, exit_code = output.exit_code, "tests finished");
        details.set("tests", report.tests);
        details.set("testsuites", report.outline);

        let mut result = TaskResult::from_counts(report.failed, 0, task_message(&output));
        if report.failed == 0 && !output.success() {
            result.add_error(task_message(&output));
        }
        Ok(result.with_details(details))
    }
}

/// Mark the GoogleTest verdict lines of the console output
fn classify_lines(output: &mut ProcessOutput) {
    for (kind, line) in &mut output.lines {
        if line.contains("[  FAILED  ]") {
            *kind = LineKind::Error;
        } else if line.contains("[       OK ]") || line.contains("[  PASSED  ]") {
            *kind = LineKind::Ok;
        }
    }
}

/// Parse the report written by `--gtest_output=json:<path>`
pub fn parse_report(content: &str) -> Result<TestReport, TaskFault> {
    let raw: serde_json::Value = serde_json::from_str(content).map_err(|e| TaskFault::Parse {
        what: "googletest report".to_string(),
        message: e.to_string(),
    })?;
    let raw = Value::from(raw);

    let mut tests = Value::object();
    let mut outline = Value::object();
    let mut failed = 0;

    outline.set("all", totals(&raw));
    outline.set("details", Value::object());

    for suite in raw.get_or("testsuites", Value::array()).to_array() {
        let suite_name = suite.get_or("name", Value::Null).to_string();
        outline.set(ValuePath::from(["details", suite_name.as_str()]), totals(&suite));

        for case in suite.get_or("testsuite", Value::array()).to_array() {
            let case_name = case.get_or("name", Value::Null).to_string();
            let failures: Vec<String> = case
                .get_or("failures", Value::array())
                .to_array()
                .iter()
                .map(|f| f.get_or("failure", Value::Null).to_string().trim().to_string())
                .collect();

            let status = if failures.is_empty() { "Ok" } else { "Error" };
            let result = match case.get_or("result", Value::Null).to_string().as_str() {
                _ if !failures.is_empty() => "Error",
                "SKIPPED" | "SUPPRESSED" => "Skipped",
                _ => "Ok",
            };
            if !failures.is_empty() {
                failed += 1;
            }

            let mut entry = Value::object();
            entry.set("name", format!("{suite_name}.{case_name}"));
            entry.set("status", status);
            entry.set("result", result);
            entry.set("message", failures.join("\n"));
            entry.set("time", case.get_or("time", Value::Null));
            tests.set(
                ValuePath::from([suite_name.as_str(), case_name.as_str()]),
                entry,
            );
        }
    }

    Ok(TestReport {
        tests,
        outline,
        failed,
    })
}

fn totals(node: &Value) -> Value {
    let mut row = Value::object();
    for field in ["name", "tests", "failures", "errors", "disabled", "time"] {
        row.set(field, node.get_or(field, Value::Null));
    }
    let broken = node.get_or("failures", Value::Null).to_number() > 0.0
        || node.get_or("errors", Value::Null).to_number() > 0.0;
    row.set("status", if broken { "Error" } else { "Ok" });
    row
}
