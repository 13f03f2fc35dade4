//! `analysis:cppcheck`: static analysis with cppcheck

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use timberyard_core::Value;

use crate::output::{process_record, task_message};
use crate::process::{self, LineKind};
use crate::registry::TaskHandler;
use crate::task::{required_setting, setting, TaskFault, TaskResult};

use super::{binary, process_options};

/// Output template: one finding per line, tab separated
const TEMPLATE: &str = "{file}\t{line}\t{severity}\t{id}\t{message}";

/// cppcheck analysis
#[derive(Debug, Default, Clone, Copy)]
pub struct CppcheckTask;

impl CppcheckTask {
    pub const TYPE: &'static str = "analysis:cppcheck";
}

#[async_trait]
impl TaskHandler for CppcheckTask {
    async fn run(&self, config: &Value) -> Result<TaskResult, TaskFault> {
        let source = required_setting(config, "source")?;
        let working_dir = match setting(config, "working_dir") {
            dir if dir.is_empty() => PathBuf::from(&source),
            dir => PathBuf::from(dir),
        };

        let enable = match setting(config, "enable") {
            enable if enable.is_empty() => "all".to_string(),
            enable => enable,
        };
        let mut arguments = vec![
            format!("--template={TEMPLATE}"),
            format!("--enable={enable}"),
            "--suppress=missingIncludeSystem".to_string(),
        ];
        arguments.extend(
            config
                .get_or("arguments", Value::array())
                .to_array()
                .iter()
                .map(Value::to_string),
        );
        arguments.push(source);

        let mut output = process::run(
            &binary(config, "binary", "cppcheck"),
            &arguments,
            &working_dir,
            &process_options(config),
        )
        .await?;

        let findings = parse_findings(output.text());
        output
            .lines
            .retain(|(kind, line)| *kind != LineKind::Error || parse_finding(line).is_none());
        info!(findings = findings.len(), exit_code = output.exit_code, "analysis finished");

        let mut details = Value::object();
        details.set("cppcheck", process_record(&output));

        let mut result = if output.success() {
            TaskResult::from_counts(0, findings.len() as u64, task_message(&output))
        } else {
            TaskResult::from_counts(1, 0, task_message(&output))
        };
        if result.message == "-" && !findings.is_empty() {
            result.message = format!("{} findings", findings.len());
        }

        details.set("errors", Value::from(findings));
        Ok(result.with_details(details))
    }
}

/// Findings in cppcheck output produced with the tab separated template.
///
/// Each becomes `{type, severity, message, file, line}` where `type` is the
/// cppcheck check id.
pub fn parse_findings<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<Value> {
    lines.into_iter().filter_map(parse_finding).collect()
}

fn parse_finding(line: &str) -> Option<Value> {
    let mut fields = line.splitn(5, '\t');
    let file = fields.next()?;
    let row = fields.next()?;
    let severity = fields.next()?;
    let id = fields.next()?;
    let message = fields.next()?;
    if id.is_empty() || severity.is_empty() {
        return None;
    }

    let mut finding = Value::object();
    finding.set("type", id);
    finding.set("severity", severity);
    finding.set("message", message.trim());
    finding.set("file", file);
    finding.set("line", row.trim().parse::<u64>().unwrap_or(0));
    Some(finding)
}
