//! Filesystem store for host reports awaiting consolidation
//!
//! Reports are filed under a digest of their (repository, branch, commit)
//! identity:
//!
//! ```text
//! <root>/<digest>/key.json                   identity of the build
//! <root>/<digest>/hosts/<host>-<hash>.json   one report per host
//! <root>/<digest>/pending                    marker, holds the last deposit time
//! <root>/<digest>/consolidated.json          output of the last consolidation
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::value::Value;

const KEY_FILE: &str = "key.json";
const HOSTS_DIR: &str = "hosts";
const PENDING_MARKER: &str = "pending";
const CLAIMED_MARKER: &str = "claimed";
const CONSOLIDATED_FILE: &str = "consolidated.json";
const HOST_DIGEST_LENGTH: usize = 12;

/// Identity of one build across hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportKey {
    pub repository: String,
    pub branch: String,
    pub commit: String,
}

impl ReportKey {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            commit: commit.into(),
        }
    }

    /// Read the key from a host report's meta section
    pub fn from_report(report: &Value) -> Result<Self, StoreError> {
        Ok(Self {
            repository: required(report, "meta.repository")?,
            branch: required(report, "meta.branch")?,
            commit: required(report, "meta.commit.id.long")?,
        })
    }

    /// Hex SHA-256 of the key fields, used as directory name
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.repository.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.branch.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.commit.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn required(report: &Value, path: &str) -> Result<String, StoreError> {
    let value = report.get_or(path, Value::Null).to_string();
    if value.trim().is_empty() {
        return Err(StoreError::MissingField(path.to_string()));
    }
    Ok(value)
}

/// A key waiting for consolidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub digest: String,
    /// Time of the most recent deposit
    pub since: DateTime<Utc>,
}

/// Directory-backed report store
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    /// Open a store, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, digest: &str) -> PathBuf {
        self.root.join(digest)
    }

    /// File a host report and mark its key pending. Returns the key digest.
    #[instrument(skip_all)]
    pub fn deposit(&self, report: &Value) -> Result<String, StoreError> {
        let key = ReportKey::from_report(report)?;
        let host = required(report, "meta.arch.host.descriptor")?;
        let digest = key.digest();
        let dir = self.entry_dir(&digest);

        std::fs::create_dir_all(dir.join(HOSTS_DIR))?;
        write_json(&dir.join(KEY_FILE), &key)?;
        write_json(&dir.join(HOSTS_DIR).join(host_file_name(&host)), report)?;
        write_atomic(&dir.join(PENDING_MARKER), Utc::now().to_rfc3339().as_bytes())?;

        info!(
            digest = %digest,
            host = %host,
            repository = %key.repository,
            branch = %key.branch,
            commit = %key.commit,
            "host report deposited"
        );
        Ok(digest)
    }

    /// Keys waiting for consolidation, oldest first
    pub fn pending(&self) -> Result<Vec<PendingEntry>, StoreError> {
        let mut entries = Vec::new();

        for dir in std::fs::read_dir(&self.root)? {
            let dir = dir?;
            let marker = dir.path().join(PENDING_MARKER);
            if !marker.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&marker)?;
            let since = DateTime::parse_from_rfc3339(content.trim())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_default();
            entries.push(PendingEntry {
                digest: dir.file_name().to_string_lossy().into_owned(),
                since,
            });
        }

        entries.sort_by(|a, b| a.since.cmp(&b.since).then_with(|| a.digest.cmp(&b.digest)));
        debug!(count = entries.len(), "pending consolidations listed");
        Ok(entries)
    }

    /// Take ownership of a pending key.
    ///
    /// Returns `false` when the key is not pending, for instance because
    /// another consolidation run claimed it first.
    pub fn claim(&self, digest: &str) -> Result<bool, StoreError> {
        let dir = self.entry_dir(digest);
        match std::fs::rename(dir.join(PENDING_MARKER), dir.join(CLAIMED_MARKER)) {
            Ok(()) => {
                debug!(digest, "consolidation claimed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Put a claimed key back into the pending set
    pub fn release(&self, digest: &str) -> Result<(), StoreError> {
        let dir = self.entry_dir(digest);
        let claimed = dir.join(CLAIMED_MARKER);
        if claimed.is_file() && !dir.join(PENDING_MARKER).exists() {
            std::fs::rename(claimed, dir.join(PENDING_MARKER))?;
            warn!(digest, "consolidation released back to pending");
        }
        Ok(())
    }

    /// Identity stored for `digest`
    pub fn key(&self, digest: &str) -> Result<ReportKey, StoreError> {
        let path = self.entry_dir(digest).join(KEY_FILE);
        if !path.is_file() {
            return Err(StoreError::UnknownKey(digest.to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    /// All host reports for `digest`, keyed by host descriptor
    pub fn host_reports(&self, digest: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        let hosts_dir = self.entry_dir(digest).join(HOSTS_DIR);
        if !hosts_dir.is_dir() {
            return Err(StoreError::UnknownKey(digest.to_string()));
        }

        let mut reports = BTreeMap::new();
        for file in std::fs::read_dir(&hosts_dir)? {
            let path = file?.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let report: Value = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let host = match report.get_or("meta.arch.host.descriptor", Value::Null) {
                Value::String(host) if !host.is_empty() => host,
                _ => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            reports.insert(host, report);
        }
        Ok(reports)
    }

    /// Store the consolidated report for `digest` and drop the claim
    pub fn write_consolidated(&self, digest: &str, report: &Value) -> Result<PathBuf, StoreError> {
        let dir = self.entry_dir(digest);
        let path = dir.join(CONSOLIDATED_FILE);
        write_json(&path, report)?;

        let claimed = dir.join(CLAIMED_MARKER);
        if claimed.exists() {
            std::fs::remove_file(claimed)?;
        }
        info!(digest, path = %path.display(), "consolidated report written");
        Ok(path)
    }
}

/// File name for a host descriptor, keeping it within one path component.
///
/// The digest suffix keeps descriptors apart that sanitize to the same name.
fn host_file_name(host: &str) -> String {
    let safe: String = host
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = format!("{:x}", Sha256::digest(host.as_bytes()));
    format!("{safe}-{}.json", &digest[..HOST_DIGEST_LENGTH])
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    write_atomic(path, json.as_bytes())
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
