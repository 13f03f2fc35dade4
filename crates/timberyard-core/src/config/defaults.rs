//! Built-in configuration: base layer and per-phase variants

use crate::error::ConfigError;
use crate::value::Value;

use super::loader::{parse_fragment, FragmentFormat};

/// Project configuration file names, in lookup order
pub const PROJECT_CONFIG_FILES: [&str; 4] = [
    "timberyard.yaml",
    "timberyard.yml",
    "timberyard.toml",
    "timberyard.json",
];

/// Environment variable naming the system configuration file
pub const SYSTEM_CONFIG_ENV: &str = "TIMBERYARD_SYSCONFIG";

/// Base configuration applied before anything else
pub const BASE_CONFIG: &str = r#"# Timberyard base configuration

meta:
  project: ""
  mode: standard
  input: "."
  output: "${meta.input}/.timberyard"
  repository: ""
  branch: ""
  commit:
    id:
      long: ""
      short: ""
    timestamp:
      default: ""
      compact: ""
  buildgap: []
  lastgood: ""
  id: "${meta.commit.id.short}-${meta.commit.timestamp.compact}"
  node:
    name: ""
  arch:
    host:
      os: ""
      architecture: ""
      descriptor: "${meta.node.name}-${meta.arch.host.os}-${meta.arch.host.architecture}"
  variants:
    checkout: nothing
    integrate: nothing
    publish: nothing
  configs:
    system: /etc/timberyard/config.yaml
    project: ""
  results:
    checkout: "${meta.output}/results/checkout.json"
    integrate: "${meta.output}/results/integrate.json"
    publish: "${meta.output}/results/publish.json"
    report: "${meta.output}/results/report.json"

tasks:
  checkout: {}
  integrate: {}
  publish: {}
  defaults:
    build:cmake:
      source: "${meta.input}"
      verbose: false
      build:
        output: "${meta.output}/build"
      cmake:
        binary: cmake
        generator: Unix Makefiles
        variables: {}
      make:
        binary: make
        variables: {}
      install:
        enabled: false
        output: "${meta.output}/install"
    test:googletest:
      binary: ""
      working_dir: "${meta.output}/build"
      filter: "*"
      output: "${meta.output}/results/googletest.json"
    analysis:cppcheck:
      binary: cppcheck
      source: "${meta.input}"
      working_dir: "${meta.input}"
      enable: all
      arguments: []
    doc:doxygen:
      binary: doxygen
      source: "${meta.input}"
      output: "${meta.output}/doc"
      doxyfile:
        PROJECT_NAME: "${meta.project}"
        RECURSIVE: "YES"
        GENERATE_LATEX: "NO"
        GENERATE_HTML: "YES"
      install:
        format: html
        directory: ""
    publish:rsync:
      source: "${meta.output}/install"
      ssh:
        binary: ssh
      rsync:
        binary: rsync
      destination:
        host: ""
        user: ""
        port: 22
        path: ""
"#;

const CHECKOUT_NOTHING: &str = "{}";

const INTEGRATE_NOTHING: &str = "{}";

const INTEGRATE_CPP: &str = r#"
tasks:
  integrate:
    build:
      type: build:cmake
      enabled: true
    test:
      type: test:googletest
      enabled: false
      dependencies:
        build: true
    analysis:
      type: analysis:cppcheck
      enabled: true
    doc:
      type: doc:doxygen
      enabled: false
"#;

const PUBLISH_NOTHING: &str = "{}";

const PUBLISH_REMOTE_RSYNC: &str = r#"
tasks:
  publish:
    upload:
      type: publish:rsync
      enabled: true
"#;

/// Parsed base configuration
pub fn base_config() -> Result<Value, ConfigError> {
    parse_fragment(BASE_CONFIG, FragmentFormat::Yaml, "built-in base configuration")
}

/// Names of the built-in variants available for a phase
pub fn variant_names(phase: &str) -> &'static [&'static str] {
    match phase {
        "checkout" => &["nothing"],
        "integrate" => &["nothing", "c++"],
        "publish" => &["nothing", "remote-rsync"],
        _ => &[],
    }
}

/// Parsed built-in variant `name` for `phase`
pub fn variant(phase: &str, name: &str) -> Result<Value, ConfigError> {
    let text = match (phase, name) {
        ("checkout", "nothing") => CHECKOUT_NOTHING,
        ("integrate", "nothing") => INTEGRATE_NOTHING,
        ("integrate", "c++") => INTEGRATE_CPP,
        ("publish", "nothing") => PUBLISH_NOTHING,
        ("publish", "remote-rsync") => PUBLISH_REMOTE_RSYNC,
        _ => {
            return Err(ConfigError::UnknownVariant {
                phase: phase.to_string(),
                name: name.to_string(),
            })
        }
    };
    parse_fragment(text, FragmentFormat::Yaml, &format!("{phase} variant '{name}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_config_parses() {
        let base = base_config().unwrap();
        assert_eq!(base.get("meta.variants.integrate").unwrap(), &Value::from("nothing"));
        assert!(base.get("tasks.defaults.build:cmake.cmake.binary").is_ok());
    }

    #[test]
    fn test_every_listed_variant_parses() {
        for phase in ["checkout", "integrate", "publish"] {
            for name in variant_names(phase) {
                assert!(variant(phase, name).is_ok(), "{phase}/{name}");
            }
        }
    }

    #[test]
    fn test_cpp_variant_declares_build() {
        let cpp = variant("integrate", "c++").unwrap();
        assert_eq!(
            cpp.get("tasks.integrate.build.type").unwrap(),
            &Value::from("build:cmake")
        );
    }

    #[test]
    fn test_unknown_variant() {
        let err = variant("integrate", "fortran").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariant { .. }));
    }
}
