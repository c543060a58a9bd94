//! Record types as they sit in the store document.
//! Distinct from courier-types view rows so the on-disk layout can evolve alone.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use courier_types::models::MessageKind;

/// The whole store document: `users`, `messages` (one mailbox per recipient)
/// and `typing`, plus any other top-level keys written through `Store::set`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
    #[serde(default)]
    pub messages: BTreeMap<String, Vec<MessageRecord>>,
    /// observed user -> observing peer -> state
    #[serde(default)]
    pub typing: BTreeMap<String, BTreeMap<String, TypingState>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Argon2 PHC string.
    pub password_hash: String,
    #[serde(default)]
    pub strikes: u8,
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            password_hash,
            strikes: 0,
            locked_until: None,
            created_at: now,
        }
    }
}

/// One entry in a recipient's mailbox. The recipient is implied by the mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub from: String,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// Sealed message payload. `msg` is always ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageBody {
    Text {
        msg: String,
    },
    File {
        msg: String,
        filename: String,
        /// Hex SHA-256 of the decoded file bytes.
        sha256: String,
    },
}

impl MessageBody {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::File { .. } => MessageKind::File,
        }
    }

    pub fn sealed(&self) -> &str {
        match self {
            Self::Text { msg } | Self::File { msg, .. } => msg,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::File { filename, .. } => Some(filename),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingState {
    pub typing: bool,
    #[serde(rename = "ts")]
    pub since: DateTime<Utc>,
}
