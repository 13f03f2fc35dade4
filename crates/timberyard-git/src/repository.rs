//! Git repository access

use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::{debug, instrument};

use timberyard_core::error::GitError;

/// Result type for git operations
pub type Result<T> = std::result::Result<T, GitError>;

/// Git repository wrapper
pub struct GitRepo {
    pub(crate) repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open a repository at the given path
    #[instrument(fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::RepositoryNotFound(path.to_path_buf())
            } else {
                GitError::OpenFailed(e.to_string())
            }
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            repo,
        })
    }

    /// Discover and open a repository by searching parent directories
    #[instrument(fields(start_path = %start_path.display()))]
    pub fn discover(start_path: &Path) -> Result<Self> {
        debug!(start_path = %start_path.display(), "discovering git repository");
        let repo = Repository::discover(start_path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::NotARepository(start_path.to_path_buf())
            } else {
                GitError::OpenFailed(e.to_string())
            }
        })?;

        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self { repo, path })
    }

    /// Repository working directory (or git dir for bare repositories)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the HEAD commit
    pub fn head_commit(&self) -> Result<git2::Commit<'_>> {
        let head = self.repo.head()?;
        head.peel_to_commit().map_err(GitError::Git2)
    }

    /// Short name of the checked out branch, `None` when HEAD is detached
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Ok(None);
        }
        Ok(head.shorthand().map(str::to_string))
    }

    /// URL configured for the remote `name`
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                Err(GitError::RemoteNotFound(name.to_string()))
            }
            Err(e) => Err(GitError::Git2(e)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    /// Repository with the given commit messages, oldest first
    pub(crate) fn repo_with_commits(messages: &[&str]) -> (TempDir, GitRepo) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let sig = Signature::now("Builder", "builder@example.com").unwrap();

        for (i, message) in messages.iter().enumerate() {
            let file = format!("file{i}.txt");
            std::fs::write(temp.path().join(&file), message).unwrap();
            let mut index = repo.index().unwrap();
            index.add_path(Path::new(&file)).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let parents = match repo.head() {
                Ok(head) => vec![head.peel_to_commit().unwrap()],
                Err(_) => Vec::new(),
            };
            let parents: Vec<&git2::Commit<'_>> = parents.iter().collect();
            repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
                .unwrap();
        }

        let git_repo = GitRepo::open(temp.path()).unwrap();
        (temp, git_repo)
    }

    #[test]
    fn test_open_repo() {
        let (_temp, repo) = repo_with_commits(&["initial"]);
        assert!(repo.head_commit().is_ok());
    }

    #[test]
    fn test_discover_repo() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();

        let subdir = temp.path().join("sub").join("dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let repo = GitRepo::discover(&subdir).unwrap();
        let repo_path = repo.path().canonicalize().unwrap();
        let temp_path = temp.path().canonicalize().unwrap();
        assert_eq!(repo_path, temp_path);
    }

    #[test]
    fn test_not_a_repo() {
        let temp = TempDir::new().unwrap();
        assert!(GitRepo::open(temp.path()).is_err());
    }

    #[test]
    fn test_current_branch() {
        let (_temp, repo) = repo_with_commits(&["initial"]);
        let branch = repo.current_branch().unwrap().unwrap();
        assert!(branch == "master" || branch == "main");
    }

    #[test]
    fn test_remote_url() {
        let (_temp, repo) = repo_with_commits(&["initial"]);
        repo.repo
            .remote("origin", "https://example.com/demo.git")
            .unwrap();
        assert_eq!(
            repo.remote_url("origin").unwrap().as_deref(),
            Some("https://example.com/demo.git")
        );
        assert!(matches!(
            repo.remote_url("upstream"),
            Err(GitError::RemoteNotFound(_))
        ));
    }
}
