//! Configuration fragment loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ConfigError;
use crate::value::Value;

use super::defaults::PROJECT_CONFIG_FILES;

/// Serialization format of a configuration fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentFormat {
    Json,
    Yaml,
    Toml,
}

impl FragmentFormat {
    /// Pick a format from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            Some("toml") => Self::Toml,
            _ => Self::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
        }
    }
}

/// Parse a fragment from text. `source_name` only appears in errors.
pub fn parse_fragment(
    text: &str,
    format: FragmentFormat,
    source_name: &str,
) -> Result<Value, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        source_name: source_name.to_string(),
        message,
    };

    let value: Value = match format {
        FragmentFormat::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?,
        FragmentFormat::Yaml => serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))?,
        FragmentFormat::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string()))?,
    };

    // An empty YAML document is null; treat it as an empty fragment
    Ok(match value {
        Value::Null => Value::object(),
        other => other,
    })
}

/// Load a fragment from a file, choosing the format by extension
pub fn load_fragment(path: &Path) -> Result<Value, ConfigError> {
    let format = FragmentFormat::from_path(path);
    info!(path = %path.display(), format = format.as_str(), "loading config");

    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let value = parse_fragment(&content, format, &path.display().to_string())?;

    debug!(path = %path.display(), "config fragment loaded");
    Ok(value)
}

/// Find a project configuration file in `start_dir` or its parents.
///
/// The first directory containing any of [`PROJECT_CONFIG_FILES`] wins.
pub fn find_project_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for project config");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in PROJECT_CONFIG_FILES {
            let candidate = current.join(name);
            if candidate.is_file() {
                info!(path = %candidate.display(), "found project config");
                return Some(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no project config found");
    None
}
