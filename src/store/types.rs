//! Queue item types shared by producers, the queue processor and the
//! reindex coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Index operation a queued change asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    /// Insert and update both re-derive and write the document
    #[inline]
    #[must_use]
    pub fn writes_document(self) -> bool {
        !matches!(self, ChangeKind::Delete)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(ChangeKind::Insert),
            "UPDATE" => Ok(ChangeKind::Update),
            "DELETE" => Ok(ChangeKind::Delete),
            other => Err(format!("unknown change kind '{other}'")),
        }
    }
}

/// One pending change in the durable queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Row id in the queue table
    pub id: i64,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub change_kind: ChangeKind,
    pub enqueued_at: DateTime<Utc>,
    /// Suppression marker written by the reindex coordinator
    pub fake: bool,
    pub indexing_host: Option<String>,
}
