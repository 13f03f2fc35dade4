//! Build metadata detected from a working copy

use tracing::{info, instrument, warn};

use timberyard_core::error::GitError;
use timberyard_core::Value;

use crate::repository::{GitRepo, Result};
use crate::types::CommitInfo;

/// Commit timestamp format written to `meta.commit.timestamp.default`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Repository identity and history for the checked out commit
#[derive(Debug, Clone)]
pub struct BuildMetadata {
    /// Remote URL, or the working directory when no remote is configured
    pub repository: String,
    /// Checked out branch, `None` on a detached HEAD
    pub branch: Option<String>,
    pub commit: CommitInfo,
    /// Commits since the last good build, newest first
    pub buildgap: Vec<CommitInfo>,
}

impl BuildMetadata {
    /// Read metadata from `repo`.
    ///
    /// `last_good` names the commit of the last successful build; without it
    /// the build gap holds only the head commit.
    #[instrument(skip(repo), fields(path = %repo.path().display()))]
    pub fn detect(repo: &GitRepo, remote: &str, last_good: Option<&str>) -> Result<Self> {
        let repository = match repo.remote_url(remote) {
            Ok(Some(url)) => url,
            Ok(None) | Err(GitError::RemoteNotFound(_)) => {
                warn!(remote, "remote not configured, using working directory as repository");
                repo.path().display().to_string()
            }
            Err(e) => return Err(e),
        };

        let branch = repo.current_branch()?;
        if branch.is_none() {
            warn!("HEAD is detached, branch not detected");
        }

        let commit = repo.head_info()?;
        let buildgap = match last_good.filter(|rev| !rev.trim().is_empty()) {
            Some(rev) => repo.commits_since(rev).unwrap_or_else(|e| {
                warn!(last_good = rev, error = %e, "last good commit not usable, build gap is the head commit");
                vec![commit.clone()]
            }),
            None => vec![commit.clone()],
        };

        info!(
            repository = %repository,
            branch = branch.as_deref().unwrap_or("-"),
            commit = %commit.id,
            buildgap = buildgap.len(),
            "git metadata detected"
        );

        Ok(Self {
            repository,
            branch,
            commit,
            buildgap,
        })
    }

    /// Metadata as a `meta` configuration fragment
    pub fn to_value(&self) -> Value {
        let mut meta = Value::object();
        meta.set("repository", self.repository.as_str());
        if let Some(branch) = &self.branch {
            meta.set("branch", branch.as_str());
        }
        meta.set("commit.id.long", self.commit.id.as_str());
        meta.set(
            "commit.timestamp.default",
            self.commit.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        );
        meta.set(
            "buildgap",
            self.buildgap.iter().map(CommitInfo::to_value).collect::<Value>(),
        );

        let mut fragment = Value::object();
        fragment.set("meta", meta);
        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tests::repo_with_commits;

    #[test]
    fn test_detect_without_remote() {
        let (temp, repo) = repo_with_commits(&["one", "two"]);
        let meta = BuildMetadata::detect(&repo, "origin", None).unwrap();

        assert_eq!(meta.repository, temp.path().display().to_string());
        assert_eq!(meta.commit.message, "two");
        assert_eq!(meta.buildgap.len(), 1);
        assert!(meta.branch.is_some());
    }

    #[test]
    fn test_detect_with_remote_and_last_good() {
        let (_temp, repo) = repo_with_commits(&["one", "two", "three"]);
        repo.repo
            .remote("origin", "git@example.com:demo.git")
            .unwrap();
        let first = repo.recent_commits(3).unwrap().pop().unwrap();

        let meta = BuildMetadata::detect(&repo, "origin", Some(&first.id)).unwrap();
        assert_eq!(meta.repository, "git@example.com:demo.git");
        assert_eq!(meta.buildgap.len(), 2);
    }

    #[test]
    fn test_to_value() {
        let (_temp, repo) = repo_with_commits(&["only"]);
        let meta = BuildMetadata::detect(&repo, "origin", None).unwrap();
        let value = meta.to_value();

        assert_eq!(
            value.get("meta.commit.id.long").unwrap(),
            &Value::from(meta.commit.id.as_str())
        );
        assert!(value.get("meta.commit.timestamp.default").is_ok());
        assert_eq!(value.get("meta.buildgap").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_last_good_keeps_metadata() {
        let (_temp, repo) = repo_with_commits(&["one", "two"]);
        let meta = BuildMetadata::detect(
            &repo,
            "origin",
            Some("0123456789abcdef0123456789abcdef01234567"),
        )
        .unwrap();

        assert_eq!(meta.commit.message, "two");
        assert_eq!(meta.buildgap.len(), 1);
        assert_eq!(meta.buildgap[0].id, meta.commit.id);
        assert!(!meta.repository.is_empty());
    }
}
