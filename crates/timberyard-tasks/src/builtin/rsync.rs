//! `publish:rsync`: upload a directory to a remote host over ssh

use std::path::PathBuf;

use async_trait::async_trait;

use timberyard_core::Value;

use crate::output::{process_record, task_message};
use crate::process;
use crate::registry::TaskHandler;
use crate::task::{required_setting, setting, TaskFault, TaskResult};

use super::{binary, process_options};

/// rsync upload
#[derive(Debug, Default, Clone, Copy)]
pub struct RsyncTask;

impl RsyncTask {
    pub const TYPE: &'static str = "publish:rsync";
}

/// Remote location of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
struct Destination {
    host: String,
    user: String,
    port: String,
    path: String,
}

impl Destination {
    fn from_config(config: &Value) -> Result<Self, TaskFault> {
        let port = match setting(config, "destination.port") {
            port if port.is_empty() => "22".to_string(),
            port => port,
        };
        Ok(Self {
            host: required_setting(config, "destination.host")?,
            user: required_setting(config, "destination.user")?,
            port,
            path: required_setting(config, "destination.path")?,
        })
    }

    fn login(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn ssh_arguments(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-p".to_string(),
            self.port.clone(),
            self.login(),
            "mkdir".to_string(),
            "-p".to_string(),
            self.path.clone(),
        ]
    }

    fn rsync_arguments(&self, ssh_binary: &str) -> Vec<String> {
        vec![
            format!("--rsh={ssh_binary} -o BatchMode=yes -p {}", self.port),
            "--archive".to_string(),
            "--delete".to_string(),
            "--verbose".to_string(),
            "./".to_string(),
            format!("{}:{}/", self.login(), self.path.trim_end_matches('/')),
        ]
    }
}

#[async_trait]
impl TaskHandler for RsyncTask {
    async fn run(&self, config: &Value) -> Result<TaskResult, TaskFault> {
        let source = PathBuf::from(required_setting(config, "source")?);
        let destination = Destination::from_config(config)?;
        let ssh_binary = binary(config, "ssh.binary", "ssh");
        let options = process_options(config);
        let mut details = Value::object();

        let mkdir = process::run(&ssh_binary, &destination.ssh_arguments(), &source, &options).await?;
        details.set("ssh:mkdir", process_record(&mkdir));
        if !mkdir.success() {
            return Ok(TaskResult::from_counts(1, 0, task_message(&mkdir)).with_details(details));
        }

        let upload = process::run(
            &binary(config, "rsync.binary", "rsync"),
            &destination.rsync_arguments(&ssh_binary),
            &source,
            &options,
        )
        .await?;
        details.set("rsync", process_record(&upload));

        let errors = u64::from(!upload.success());
        Ok(TaskResult::from_counts(errors, 0, task_message(&upload)).with_details(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        Value::from(json!({
            "source": "/out/install",
            "destination": {"host": "files.example.com", "user": "ci", "port": 2222, "path": "/srv/builds/demo/"}
        }))
    }

    #[test]
    fn test_destination_arguments() {
        let destination = Destination::from_config(&config()).unwrap();
        assert_eq!(
            destination.ssh_arguments(),
            vec!["-o", "BatchMode=yes", "-p", "2222", "ci@files.example.com", "mkdir", "-p", "/srv/builds/demo/"]
        );
        assert_eq!(
            destination.rsync_arguments("ssh"),
            vec![
                "--rsh=ssh -o BatchMode=yes -p 2222",
                "--archive",
                "--delete",
                "--verbose",
                "./",
                "ci@files.example.com:/srv/builds/demo/",
            ]
        );
    }

    #[test]
    fn test_default_port() {
        let mut config = config();
        config.remove("destination.port");
        assert_eq!(Destination::from_config(&config).unwrap().port, "22");
    }

    #[test]
    fn test_missing_host() {
        let mut config = config();
        config.set("destination.host", "");
        assert!(matches!(
            Destination::from_config(&config),
            Err(TaskFault::MissingSetting(ref s)) if s == "destination.host"
        ));
    }
}
