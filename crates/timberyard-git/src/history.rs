//! Commit history

use chrono::{TimeZone, Utc};
use git2::{Oid, Sort};

use crate::repository::{GitRepo, Result};
use crate::types::CommitInfo;

impl GitRepo {
    /// The HEAD commit as [`CommitInfo`]
    pub fn head_info(&self) -> Result<CommitInfo> {
        let head = self.head_commit()?;
        Ok(commit_to_info(&head))
    }

    /// Commits reachable from HEAD but not from `since`, newest first
    pub fn commits_since(&self, since: &str) -> Result<Vec<CommitInfo>> {
        let since_oid = self.repo.revparse_single(since)?.peel_to_commit()?.id();
        self.walk(Some(since_oid), None)
    }

    /// The most recent `count` commits, newest first
    pub fn recent_commits(&self, count: usize) -> Result<Vec<CommitInfo>> {
        self.walk(None, Some(count))
    }

    fn walk(&self, hide: Option<Oid>, limit: Option<usize>) -> Result<Vec<CommitInfo>> {
        let head = self.head_commit()?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(head.id())?;
        if let Some(hide) = hide {
            revwalk.hide(hide)?;
        }

        let mut commits = Vec::new();
        for oid in revwalk.take(limit.unwrap_or(usize::MAX)) {
            let commit = self.repo.find_commit(oid?)?;
            commits.push(commit_to_info(&commit));
        }
        Ok(commits)
    }
}

/// Convert a git2 Commit to CommitInfo
fn commit_to_info(commit: &git2::Commit<'_>) -> CommitInfo {
    let author = commit.author();
    let message = commit.summary().unwrap_or("(no message)").to_string();

    let timestamp = Utc
        .timestamp_opt(commit.time().seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now);

    CommitInfo::new(
        commit.id().to_string(),
        message,
        author.name().unwrap_or("Unknown"),
        author.email().unwrap_or(""),
        timestamp,
    )
}

#[cfg(test)]
mod tests {
    use crate::repository::tests::repo_with_commits;

    #[test]
    fn test_head_info() {
        let (_temp, repo) = repo_with_commits(&["first", "second"]);
        let head = repo.head_info().unwrap();
        assert_eq!(head.message, "second");
        assert_eq!(head.author, "Builder");
        assert_eq!(head.id.len(), 40);
    }

    #[test]
    fn test_recent_commits() {
        let (_temp, repo) = repo_with_commits(&["one", "two", "three"]);
        let commits = repo.recent_commits(2).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "three");
    }

    #[test]
    fn test_commits_since() {
        let (_temp, repo) = repo_with_commits(&["one", "two", "three"]);
        let all = repo.recent_commits(10).unwrap();
        let since = repo.commits_since(&all[2].id).unwrap();
        let messages: Vec<_> = since.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["three", "two"]);
    }
}
