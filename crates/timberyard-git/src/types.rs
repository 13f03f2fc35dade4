//! Git types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use timberyard_core::Value;

/// Information about a git commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit id
    pub id: String,
    /// First 7 characters of the id
    pub short_id: String,
    /// First line of the message
    pub message: String,
    pub author: String,
    pub author_email: String,
    /// Commit time
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    pub fn new(
        id: impl Into<String>,
        message: impl Into<String>,
        author: impl Into<String>,
        author_email: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        let short_id = id.chars().take(7).collect();

        Self {
            id,
            short_id,
            message: message.into(),
            author: author.into(),
            author_email: author_email.into(),
            timestamp,
        }
    }

    /// Build gap entry for reports
    pub fn to_value(&self) -> Value {
        let mut value = Value::object();
        value.set("id", self.id.as_str());
        value.set("message", self.message.as_str());
        value.set("author", self.author.as_str());
        value.set("email", self.author_email.as_str());
        value.set("timestamp", self.timestamp.to_rfc3339());
        value
    }
}
