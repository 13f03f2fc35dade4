//! `build:cmake`: configure with cmake, build with make, optionally install

use std::path::PathBuf;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use timberyard_core::{TaskStatus, Value};

use crate::output::{process_record, task_message};
use crate::process::{self, ProcessOutput};
use crate::registry::TaskHandler;
use crate::task::{required_setting, setting, TaskFault, TaskResult};

use super::{binary, process_options};

/// CMake configure and make build
#[derive(Debug, Default, Clone, Copy)]
pub struct CmakeTask;

impl CmakeTask {
    pub const TYPE: &'static str = "build:cmake";
}

#[async_trait]
impl TaskHandler for CmakeTask {
    async fn run(&self, config: &Value) -> Result<TaskResult, TaskFault> {
        let source = required_setting(config, "source")?;
        let build_dir = PathBuf::from(required_setting(config, "build.output")?);
        let install_dir = setting(config, "install.output");

        tokio::fs::create_dir_all(&build_dir).await?;
        if !install_dir.is_empty() {
            tokio::fs::create_dir_all(&install_dir).await?;
        }

        let options = process_options(config);
        let make_binary = binary(config, "make.binary", "make");
        let mut details = Value::object();

        let cmake = process::run(
            &binary(config, "cmake.binary", "cmake"),
            &cmake_arguments(config, &source, &install_dir),
            &build_dir,
            &options,
        )
        .await?;
        details.set("cmake", process_record(&cmake));
        if !cmake.success() {
            let mut result = TaskResult::new(TaskStatus::Error, task_message(&cmake));
            result.errors = 1;
            return Ok(result.with_details(details));
        }

        let make_variables = make_arguments(config);
        let make = process::run(&make_binary, &make_variables, &build_dir, &options).await?;
        details.set("make", process_record(&make));

        let diagnostics = parse_diagnostics(&make);
        let errors = count_type(&diagnostics, "error");
        let warnings = count_type(&diagnostics, "warning");
        info!(errors, warnings, exit_code = make.exit_code, "build finished");
        details.set("results", Value::from(diagnostics));

        let mut result = TaskResult::from_counts(errors, warnings, task_message(&make));
        if !make.success() {
            result.status = TaskStatus::Error;
        }

        if make.success() && config.get_or("install.enabled", Value::Null).to_boolean() {
            let mut arguments = vec!["install".to_string()];
            arguments.extend(make_variables);
            let install = process::run(&make_binary, &arguments, &build_dir, &options).await?;
            details.set("install", process_record(&install));

            result.message = task_message(&install);
            if !install.success() {
                result.add_error(task_message(&install));
            }
        }

        Ok(result.with_details(details))
    }
}

fn cmake_arguments(config: &Value, source: &str, install_dir: &str) -> Vec<String> {
    let mut arguments = Vec::new();

    for (name, variable) in config.get_or("cmake.variables", Value::object()).to_object() {
        let kind = variable.get_or("type", "STRING").to_string();
        let value = variable.get_or("value", Value::Null).to_string();
        arguments.push(format!("-D{name}:{kind}={value}"));
    }
    if !install_dir.is_empty() {
        arguments.push(format!(
            "-DCMAKE_INSTALL_PREFIX:STRING={}",
            install_dir.replace('\\', "/")
        ));
    }
    if config.get_or("verbose", Value::Null).to_boolean() {
        arguments.push("-DCMAKE_VERBOSE_MAKEFILE:BOOLEAN=ON".to_string());
    }

    let generator = setting(config, "cmake.generator");
    if !generator.is_empty() {
        arguments.push("-G".to_string());
        arguments.push(generator);
    }
    arguments.push(source.replace('\\', "/"));
    arguments
}

fn make_arguments(config: &Value) -> Vec<String> {
    config
        .get_or("make.variables", Value::object())
        .to_object()
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect()
}

fn diagnostic_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(?P<file>[^:\s][^:]*):(?P<row>\d+):(?:(?P<column>\d+):)?\s*(?P<kind>fatal error|error|warning):\s*(?P<message>.*)$",
            )
            .ok()
        })
        .as_ref()
}

/// Compiler diagnostics (`file:row:column: warning|error: message`) in the
/// output of a build.
///
/// Each becomes `{type, message, filename, row, column}`; fatal errors count
/// as errors.
pub fn parse_diagnostics(output: &ProcessOutput) -> Vec<Value> {
    let Some(pattern) = diagnostic_pattern() else {
        return Vec::new();
    };

    output
        .text()
        .filter_map(|line| pattern.captures(line.trim()))
        .map(|caps| {
            let kind = match &caps["kind"] {
                "warning" => "warning",
                _ => "error",
            };
            let number = |name: &str| {
                caps.name(name)
                    .and_then(|m| m.as_str().parse::<u64>().ok())
                    .unwrap_or(0)
            };

            let mut diagnostic = Value::object();
            diagnostic.set("type", kind);
            diagnostic.set("message", caps["message"].trim());
            diagnostic.set("filename", &caps["file"]);
            diagnostic.set("row", number("row"));
            diagnostic.set("column", number("column"));
            diagnostic
        })
        .collect()
}

fn count_type(diagnostics: &[Value], kind: &str) -> u64 {
    diagnostics
        .iter()
        .filter(|d| d.get_or("type", Value::Null).as_str() == Some(kind))
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::LineKind;
    use serde_json::json;

    fn make_output(lines: &[&str]) -> ProcessOutput {
        ProcessOutput {
            binary: "make".to_string(),
            arguments: Vec::new(),
            working_dir: PathBuf::from("."),
            lines: lines
                .iter()
                .map(|l| (LineKind::Error, l.to_string()))
                .collect(),
            exit_code: 0,
        }
    }

    #[test]
    fn test_parse_diagnostics() {
        let output = make_output(&[
            "[ 50%] Building CXX object main.cpp.o",
            "/src/main.cpp:10:3: warning: unused variable 'x' [-Wunused-variable]",
            "/src/lib.cpp:42:1: error: expected ';' before '}' token",
            "/src/gen.h:7: fatal error: missing.h: No such file or directory",
            "make: *** [all] Error 2",
        ]);
        let diagnostics = parse_diagnostics(&output);

        assert_eq!(diagnostics.len(), 3);
        assert_eq!(
            diagnostics[0],
            Value::from(json!({
                "type": "warning",
                "message": "unused variable 'x' [-Wunused-variable]",
                "filename": "/src/main.cpp",
                "row": 10,
                "column": 3
            }))
        );
        assert_eq!(diagnostics[1].get("type").unwrap(), &Value::from("error"));
        assert_eq!(diagnostics[2].get("type").unwrap(), &Value::from("error"));
        assert_eq!(diagnostics[2].get("column").unwrap(), &Value::from(0));
        assert_eq!(count_type(&diagnostics, "error"), 2);
        assert_eq!(count_type(&diagnostics, "warning"), 1);
    }

    #[test]
    fn test_cmake_arguments() {
        let config = Value::from(json!({
            "verbose": "yes",
            "cmake": {
                "generator": "Ninja",
                "variables": {
                    "CMAKE_BUILD_TYPE": {"type": "STRING", "value": "Release"},
                    "WITH_TESTS": {"type": "BOOL", "value": "ON"}
                }
            }
        }));
        let arguments = cmake_arguments(&config, "/src", "/out/install");

        assert_eq!(
            arguments,
            vec![
                "-DCMAKE_BUILD_TYPE:STRING=Release",
                "-DWITH_TESTS:BOOL=ON",
                "-DCMAKE_INSTALL_PREFIX:STRING=/out/install",
                "-DCMAKE_VERBOSE_MAKEFILE:BOOLEAN=ON",
                "-G",
                "Ninja",
                "/src",
            ]
        );
    }

    #[test]
    fn test_make_arguments() {
        let config = Value::from(json!({"make": {"variables": {"JOBS": 4, "CC": "clang"}}}));
        assert_eq!(make_arguments(&config), vec!["CC=clang", "JOBS=4"]);
    }

    #[tokio::test]
    async fn test_missing_source_faults() {
        let err = CmakeTask.run(&Value::object()).await.unwrap_err();
        assert!(matches!(err, TaskFault::MissingSetting(ref s) if s == "source"));
    }
}
