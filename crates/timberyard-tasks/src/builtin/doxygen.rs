//! `doc:doxygen`: generate and install API documentation

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, warn};
use walkdir::WalkDir;

use timberyard_core::Value;

use crate::output::{process_record, task_message};
use crate::process;
use crate::registry::TaskHandler;
use crate::task::{required_setting, setting, TaskFault, TaskResult};

use super::{binary, process_options};

/// Doxygen documentation build
#[derive(Debug, Default, Clone, Copy)]
pub struct DoxygenTask;

impl DoxygenTask {
    pub const TYPE: &'static str = "doc:doxygen";
}

#[async_trait]
impl TaskHandler for DoxygenTask {
    async fn run(&self, config: &Value) -> Result<TaskResult, TaskFault> {
        let source = required_setting(config, "source")?;
        let output_dir = PathBuf::from(required_setting(config, "output")?);
        tokio::fs::create_dir_all(&output_dir).await?;

        let doxyfile = output_dir.join("doxyfile");
        tokio::fs::write(&doxyfile, render_doxyfile(config, &source, &output_dir)).await?;

        let output = process::run(
            &binary(config, "binary", "doxygen"),
            &[doxyfile.display().to_string()],
            &output_dir,
            &process_options(config),
        )
        .await?;

        let mut details = Value::object();
        details.set("doxygen", process_record(&output));

        if !output.success() {
            return Ok(TaskResult::from_counts(1, 0, task_message(&output)).with_details(details));
        }
        let mut result = TaskResult::from_counts(0, 0, task_message(&output));

        let install_dir = setting(config, "install.directory");
        if !install_dir.is_empty() {
            let format = match setting(config, "install.format") {
                format if format.is_empty() => "html".to_string(),
                format => format,
            };
            let from = output_dir.join(&format);
            let to = Path::new(&install_dir).join(&format);

            match copy_dir(&from, &to) {
                Ok(files) => {
                    info!(format = %format, files, to = %to.display(), "documentation installed");
                }
                Err(e) => {
                    warn!(format = %format, error = %e, "documentation install failed");
                    result.add_error(format!("Could not copy {format} format output."));
                }
            }
        }

        Ok(result.with_details(details))
    }
}

/// Doxyfile content: every `doxyfile.*` setting plus the input and output
/// directories
fn render_doxyfile(config: &Value, source: &str, output_dir: &Path) -> String {
    let mut content = String::new();
    for (key, value) in config.get_or("doxyfile", Value::object()).to_object() {
        content.push_str(&format!("{key} = {value}\n"));
    }
    content.push_str(&format!("INPUT = {source}\n"));
    content.push_str(&format!("OUTPUT_DIRECTORY = {}\n", output_dir.display()));
    content
}

/// Recursively copy `from` into `to`, returning the number of files copied
fn copy_dir(from: &Path, to: &Path) -> std::io::Result<usize> {
    if !from.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", from.display()),
        ));
    }

    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(std::io::Error::other)?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_render_doxyfile() {
        let config = Value::from(json!({
            "doxyfile": {"PROJECT_NAME": "demo", "RECURSIVE": "YES"}
        }));
        let content = render_doxyfile(&config, "/src", Path::new("/out/doc"));
        assert_eq!(
            content,
            "PROJECT_NAME = demo\nRECURSIVE = YES\nINPUT = /src\nOUTPUT_DIRECTORY = /out/doc\n"
        );
    }

    #[test]
    fn test_copy_dir() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("html");
        std::fs::create_dir_all(from.join("search")).unwrap();
        std::fs::write(from.join("index.html"), "<html/>").unwrap();
        std::fs::write(from.join("search").join("all.js"), "//").unwrap();

        let to = temp.path().join("install").join("html");
        assert_eq!(copy_dir(&from, &to).unwrap(), 2);
        assert!(to.join("search").join("all.js").is_file());
    }

    #[test]
    fn test_copy_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(copy_dir(&temp.path().join("none"), &temp.path().join("to")).is_err());
    }
}
