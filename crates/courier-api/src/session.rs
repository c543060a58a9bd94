use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

/// Usernames that have logged in successfully since the process started.
///
/// In-memory only: a restart requires every client to log in again.
#[derive(Debug, Default)]
pub struct Sessions {
    active: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl Sessions {
    pub fn open(&self, username: &str, at: DateTime<Utc>) {
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        active.insert(username.to_string(), at);
    }

    pub fn is_active(&self, username: &str) -> bool {
        let active = self.active.read().unwrap_or_else(|e| e.into_inner());
        active.contains_key(username)
    }

    /// Resolve the caller of an auth-gated request.
    pub fn authenticate<'a>(&self, username: Option<&'a str>) -> Option<&'a str> {
        username.filter(|u| !u.is_empty() && self.is_active(u))
    }
}
