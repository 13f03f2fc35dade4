//! Configuration bootstrap for a run
//!
//! Layers are applied in a fixed order: the built-in base, host identity and
//! command line arguments, system and project files, phase variants, build
//! metadata from git or Jenkins, and finally values computed from everything
//! before. Task defaults are expanded last so every task sees the final
//! input and output directories.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, instrument, warn};

use timberyard_core::config::{base_config, find_project_config, variant, SYSTEM_CONFIG_ENV};
use timberyard_core::{Config, Priority, Value, ValuePath, PHASES};
use timberyard_git::{BuildMetadata, GitRepo, TIMESTAMP_FORMAT};

/// Format of `meta.commit.timestamp.compact`
pub const COMPACT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Format of the Jenkins `BUILD_ID` variable
const BUILD_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

const SHORT_ID_LENGTH: usize = 7;

/// Where build metadata comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Read the git working copy in the input directory
    #[default]
    Standard,
    /// Read the variables exported by a Jenkins job
    Jenkins,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Jenkins => "jenkins",
        }
    }
}

/// Command line input to the bootstrap
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    pub mode: Mode,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// `path=value` overrides
    pub assignments: Vec<String>,
}

/// Bootstrap from the process environment
pub fn bootstrap(options: &BootstrapOptions) -> anyhow::Result<Config> {
    bootstrap_with(options, |name| std::env::var(name).ok())
}

/// Bootstrap with `env` looking up environment variables
#[instrument(skip_all, fields(mode = options.mode.as_str()))]
pub fn bootstrap_with<E>(options: &BootstrapOptions, env: E) -> anyhow::Result<Config>
where
    E: Fn(&str) -> Option<String>,
{
    let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());
    let mut config = Config::new();

    config.apply(Priority::Base, base_config()?)?;
    config.apply_value(Priority::Arguments, "meta.mode", options.mode.as_str())?;
    apply_host(&mut config)?;

    if options.mode == Mode::Jenkins {
        if let Some(node) = env("NODE_NAME") {
            config.apply_value(Priority::Arguments, "meta.node.name", node)?;
        }
        if let Some(workspace) = env("WORKSPACE") {
            config.apply_value(Priority::Arguments, "meta.input", workspace)?;
        }
    }
    if let Some(system) = env(SYSTEM_CONFIG_ENV) {
        config.apply_value(Priority::Environment, "meta.configs.system", system)?;
    }

    apply_arguments(&mut config, options)?;
    apply_config_files(&mut config)?;
    apply_variants(&mut config)?;

    match options.mode {
        Mode::Jenkins => apply_jenkins_metadata(&mut config, &env)?,
        Mode::Standard => apply_git_metadata(&mut config)?,
    }

    apply_computed(&mut config)?;
    config.expand_task_defaults()?;

    info!(
        input = %config.get_or("meta.input", timberyard_core::Value::Null),
        output = %config.get_or("meta.output", timberyard_core::Value::Null),
        id = %config.get_or("meta.id", timberyard_core::Value::Null),
        "configuration bootstrapped"
    );
    Ok(config)
}

fn apply_host(config: &mut Config) -> anyhow::Result<()> {
    match hostname::get() {
        Ok(name) => {
            config.apply_value(
                Priority::Arguments,
                "meta.node.name",
                name.to_string_lossy().into_owned(),
            )?;
        }
        Err(e) => warn!(error = %e, "could not read hostname"),
    }

    let mut host = Value::object();
    host.set("os", std::env::consts::OS);
    host.set("architecture", std::env::consts::ARCH);
    let mut fragment = Value::object();
    fragment.set("meta.arch.host", host);
    config.apply(Priority::Environment, fragment)?;
    Ok(())
}

fn apply_arguments(config: &mut Config, options: &BootstrapOptions) -> anyhow::Result<()> {
    if let Some(input) = &options.input {
        config.apply_value(Priority::Arguments, "meta.input", input.display().to_string())?;
    }
    if let Some(output) = &options.output {
        config.apply_value(Priority::Arguments, "meta.output", output.display().to_string())?;
    }
    if !options.assignments.is_empty() {
        config
            .apply_assignments(Priority::Arguments, &options.assignments)
            .context("invalid configuration override")?;
    }
    Ok(())
}

fn apply_config_files(config: &mut Config) -> anyhow::Result<()> {
    match path_setting(config, "meta.configs.system") {
        Some(system) if system.is_file() => {
            config.apply_file(Priority::System, &system)?;
            info!(path = %system.display(), "system configuration loaded");
        }
        Some(system) => debug!(path = %system.display(), "no system configuration"),
        None => {}
    }

    // an explicit project file must exist, a discovered one always does
    let project = match path_setting(config, "meta.configs.project") {
        Some(project) => Some(project),
        None => find_project_config(&input_dir(config)),
    };
    if let Some(project) = project {
        config
            .apply_file(Priority::Project, &project)
            .with_context(|| format!("failed to load project configuration {}", project.display()))?;
        config.apply_value(
            Priority::Computed,
            "meta.configs.project",
            project.display().to_string(),
        )?;
        info!(path = %project.display(), "project configuration loaded");
    }
    Ok(())
}

fn apply_variants(config: &mut Config) -> anyhow::Result<()> {
    for phase in PHASES {
        let name = config
            .get_or(ValuePath::from(["meta", "variants", phase]), "nothing")
            .to_string();
        config.apply(Priority::Variant, variant(phase, &name)?)?;
        debug!(phase, variant = %name, "variant applied");
    }
    Ok(())
}

fn apply_jenkins_metadata<E>(config: &mut Config, env: &E) -> anyhow::Result<()>
where
    E: Fn(&str) -> Option<String>,
{
    let mut meta = Value::object();
    if let Some(branch) = env("GIT_BRANCH") {
        meta.set("branch", branch.strip_prefix("origin/").unwrap_or(&branch));
    }
    if let Some(url) = env("GIT_URL") {
        meta.set("repository", url);
    }
    if let Some(commit) = env("GIT_COMMIT") {
        meta.set("commit.id.long", commit);
    }
    if let Some(build_id) = env("BUILD_ID") {
        match NaiveDateTime::parse_from_str(&build_id, BUILD_ID_FORMAT) {
            Ok(timestamp) => {
                meta.set(
                    "commit.timestamp.default",
                    timestamp.format(TIMESTAMP_FORMAT).to_string(),
                );
            }
            Err(e) => warn!(build_id = %build_id, error = %e, "BUILD_ID is not a build timestamp"),
        }
    }

    let mut fragment = Value::object();
    fragment.set("meta", meta);
    config.apply(Priority::Environment, fragment)?;
    Ok(())
}

fn apply_git_metadata(config: &mut Config) -> anyhow::Result<()> {
    let input = input_dir(config);
    if !input.join(".git").exists() {
        debug!(input = %input.display(), "input is not a git working copy");
        return Ok(());
    }

    let last_good = config.get_or("meta.lastgood", Value::Null).to_string();
    let detected = GitRepo::open(&input)
        .and_then(|repo| BuildMetadata::detect(&repo, "origin", Some(last_good.as_str())));
    match detected {
        Ok(metadata) => config.apply(Priority::Environment, metadata.to_value())?,
        Err(e) => warn!(input = %input.display(), error = %e, "git metadata not detected"),
    }
    Ok(())
}

fn apply_computed(config: &mut Config) -> anyhow::Result<()> {
    let mut meta = Value::object();

    let long_id = config.get_or("meta.commit.id.long", Value::Null).to_string();
    meta.set(
        "commit.id.short",
        long_id.chars().take(SHORT_ID_LENGTH).collect::<String>(),
    );

    let timestamp =
        commit_timestamp(&config.get_or("meta.commit.timestamp.default", Value::Null).to_string());
    meta.set(
        "commit.timestamp.default",
        timestamp.format(TIMESTAMP_FORMAT).to_string(),
    );
    meta.set(
        "commit.timestamp.compact",
        timestamp.format(COMPACT_TIMESTAMP_FORMAT).to_string(),
    );

    let cwd = std::env::current_dir()?;
    let mut paths: Vec<Vec<String>> = [
        vec!["input"],
        vec!["output"],
        vec!["configs", "system"],
        vec!["configs", "project"],
    ]
    .into_iter()
    .map(|segments| segments.into_iter().map(String::from).collect())
    .collect();
    paths.extend(
        config
            .get_or("meta.results", Value::object())
            .to_object()
            .into_keys()
            .map(|name| vec!["results".to_string(), name]),
    );
    for segments in paths {
        let mut absolute = vec!["meta".to_string()];
        absolute.extend(segments.iter().cloned());
        let value = config.get_or(ValuePath::from(absolute), Value::Null).to_string();
        if !value.is_empty() {
            meta.set(
                ValuePath::from(segments),
                normalize(&cwd, Path::new(&value)).display().to_string(),
            );
        }
    }

    let mut fragment = Value::object();
    fragment.set("meta", meta);
    config.apply(Priority::Computed, fragment)?;
    Ok(())
}

/// Commit time from `text`, or the current time when it is empty or invalid
fn commit_timestamp(text: &str) -> NaiveDateTime {
    let text = text.trim();
    if text.is_empty() {
        return Local::now().naive_local();
    }
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).unwrap_or_else(|e| {
        warn!(timestamp = %text, error = %e, "invalid commit timestamp, using current time");
        Local::now().naive_local()
    })
}

fn path_setting(config: &Config, path: &str) -> Option<PathBuf> {
    match config.get_or(path, Value::Null).to_string() {
        value if value.trim().is_empty() => None,
        value => Some(PathBuf::from(value)),
    }
}

fn input_dir(config: &Config) -> PathBuf {
    path_setting(config, "meta.input").unwrap_or_else(|| PathBuf::from("."))
}

/// Absolute form of `path` with `.` and `..` removed, without touching the
/// filesystem
pub fn normalize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn options(input: &Path) -> BootstrapOptions {
        BootstrapOptions {
            input: Some(input.to_path_buf()),
            ..Default::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    fn get(config: &Config, path: &str) -> String {
        config.get_or(path, Value::Null).to_string()
    }

    #[test]
    fn test_defaults_for_plain_directory() {
        let temp = TempDir::new().unwrap();
        let config = bootstrap_with(&options(temp.path()), no_env).unwrap();
        let input = temp.path().display().to_string();

        assert_eq!(get(&config, "meta.mode"), "standard");
        assert_eq!(get(&config, "meta.input"), input);
        assert_eq!(
            get(&config, "meta.output"),
            temp.path().join(".timberyard").display().to_string()
        );
        assert_eq!(
            get(&config, "meta.results.report"),
            temp.path()
                .join(".timberyard")
                .join("results")
                .join("report.json")
                .display()
                .to_string()
        );
        assert_eq!(get(&config, "meta.commit.id.short"), "");
        assert_eq!(get(&config, "meta.commit.timestamp.compact").len(), 15);

        let descriptor = get(&config, "meta.arch.host.descriptor");
        let suffix = format!("-{}-{}", std::env::consts::OS, std::env::consts::ARCH);
        assert!(descriptor.ends_with(&suffix), "{descriptor}");
        assert_eq!(get(&config, "meta.arch.host.os"), std::env::consts::OS);
    }

    #[test]
    fn test_project_file_and_variant() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("timberyard.yaml"),
            "meta:\n  project: demo\n  variants:\n    integrate: c++\n",
        )
        .unwrap();
        let output = temp.path().join("out");
        let options = BootstrapOptions {
            output: Some(output.clone()),
            ..options(temp.path())
        };
        let config = bootstrap_with(&options, no_env).unwrap();

        assert_eq!(get(&config, "meta.project"), "demo");
        assert_eq!(
            get(&config, "meta.configs.project"),
            temp.path().join("timberyard.yaml").display().to_string()
        );
        assert_eq!(get(&config, "tasks.integrate.build.type"), "build:cmake");
        assert_eq!(
            get(&config, "tasks.integrate.build.source"),
            temp.path().display().to_string()
        );
        assert_eq!(
            get(&config, "tasks.integrate.build.build.output"),
            output.join("build").display().to_string()
        );
        assert_eq!(get(&config, "tasks.integrate.doc.doxyfile.PROJECT_NAME"), "demo");
    }

    #[test]
    fn test_arguments_override_project_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("timberyard.yaml"), "meta:\n  project: demo\n").unwrap();
        let options = BootstrapOptions {
            assignments: vec!["meta.project=override".to_string()],
            ..options(temp.path())
        };
        let config = bootstrap_with(&options, no_env).unwrap();
        assert_eq!(get(&config, "meta.project"), "override");
    }

    #[test]
    fn test_invalid_assignment() {
        let temp = TempDir::new().unwrap();
        let options = BootstrapOptions {
            assignments: vec!["meta.project".to_string()],
            ..options(temp.path())
        };
        assert!(bootstrap_with(&options, no_env).is_err());
    }

    #[test]
    fn test_unknown_variant() {
        let temp = TempDir::new().unwrap();
        let options = BootstrapOptions {
            assignments: vec!["meta.variants.publish=ftp".to_string()],
            ..options(temp.path())
        };
        assert!(bootstrap_with(&options, no_env).is_err());
    }

    #[test]
    fn test_system_config_from_environment() {
        let temp = TempDir::new().unwrap();
        let system = temp.path().join("system.toml");
        std::fs::write(&system, "[meta]\nproject = \"from-system\"\n").unwrap();
        let input = temp.path().join("src");
        std::fs::create_dir_all(&input).unwrap();

        let env = env_from(&[(SYSTEM_CONFIG_ENV, system.to_str().unwrap())]);
        let config = bootstrap_with(&options(&input), env).unwrap();
        assert_eq!(get(&config, "meta.project"), "from-system");
        assert_eq!(get(&config, "meta.configs.system"), system.display().to_string());
    }

    #[test]
    fn test_missing_explicit_project_file() {
        let temp = TempDir::new().unwrap();
        let options = BootstrapOptions {
            assignments: vec![format!(
                "meta.configs.project={}",
                temp.path().join("missing.yaml").display()
            )],
            ..options(temp.path())
        };
        assert!(bootstrap_with(&options, no_env).is_err());
    }

    #[test]
    fn test_jenkins_environment() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().display().to_string();
        let env = env_from(&[
            ("NODE_NAME", "builder7"),
            ("WORKSPACE", workspace.as_str()),
            ("GIT_BRANCH", "origin/release/2.0"),
            ("GIT_URL", "git@example.com:demo.git"),
            ("GIT_COMMIT", "0123456789abcdef"),
            ("BUILD_ID", "2024-03-01_12-30-45"),
        ]);
        let options = BootstrapOptions {
            mode: Mode::Jenkins,
            ..Default::default()
        };
        let config = bootstrap_with(&options, env).unwrap();

        assert_eq!(get(&config, "meta.mode"), "jenkins");
        assert_eq!(get(&config, "meta.input"), workspace);
        assert_eq!(get(&config, "meta.node.name"), "builder7");
        assert_eq!(get(&config, "meta.branch"), "release/2.0");
        assert_eq!(get(&config, "meta.repository"), "git@example.com:demo.git");
        assert_eq!(get(&config, "meta.commit.id.short"), "0123456");
        assert_eq!(get(&config, "meta.commit.timestamp.default"), "2024-03-01 12:30:45");
        assert_eq!(get(&config, "meta.commit.timestamp.compact"), "20240301-123045");
        assert_eq!(get(&config, "meta.id"), "0123456-20240301-123045");
        assert!(get(&config, "meta.arch.host.descriptor").starts_with("builder7-"));
    }

    #[test]
    fn test_result_names_with_dots() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("x").join("..").join("coverage.xml");
        std::fs::write(
            temp.path().join("timberyard.json"),
            serde_json::json!({"meta": {"results": {"coverage.xml": target.display().to_string()}}})
                .to_string(),
        )
        .unwrap();
        let config = bootstrap_with(&options(temp.path()), no_env).unwrap();

        assert_eq!(
            config
                .get_or(ValuePath::from(["meta", "results", "coverage.xml"]), Value::Null)
                .to_string(),
            temp.path().join("coverage.xml").display().to_string()
        );
        assert!(!config.resolved().contains("meta.results.coverage"));
    }

    #[test]
    fn test_commit_timestamp() {
        let parsed = commit_timestamp("2023-11-05 08:00:01");
        assert_eq!(parsed.format(COMPACT_TIMESTAMP_FORMAT).to_string(), "20231105-080001");
        // falls back to now
        assert!(commit_timestamp("yesterday").and_utc().timestamp() > 0);
        assert!(commit_timestamp("").and_utc().timestamp() > 0);
    }

    #[test]
    fn test_normalize() {
        let base = Path::new("/work/ci");
        assert_eq!(normalize(base, Path::new("src/../out/./x")), PathBuf::from("/work/ci/out/x"));
        assert_eq!(normalize(base, Path::new("/abs/./p")), PathBuf::from("/abs/p"));
        assert_eq!(normalize(base, Path::new(".")), PathBuf::from("/work/ci"));
    }
}
