use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    File,
}

/// A decrypted mailbox entry as returned by `inbox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub from: String,
    pub msg: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    /// Read flag as it was before this fetch.
    pub read: bool,
}

/// Per-peer roll-up of one user's inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub peer: String,
    pub total: usize,
    pub unread: usize,
    pub last_ts: DateTime<Utc>,
    pub last_preview: String,
}

/// One line of a reconstructed two-party thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: String,
    pub to: String,
    pub msg: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub from: String,
    pub to: String,
    pub msg: String,
    pub timestamp: DateTime<Utc>,
}
