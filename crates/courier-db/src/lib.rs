pub mod migrations;
pub mod models;
pub mod queries;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info, trace};

pub use models::{Document, MessageBody, MessageRecord, TypingState, UserRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store document root is not an object")]
    NotAnObject,
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Single JSON document on disk, guarded by one process-wide lock.
///
/// Every operation re-reads the whole file, applies its change and writes the
/// whole file back while holding the lock, so no two operations interleave.
/// Writes go to a sibling temp file which is fsynced and renamed over the
/// document; a failed write leaves the previous document in place.
pub struct Store {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        };

        let mut raw = if path.exists() {
            store.read_raw()?
        } else {
            info!("Creating new store document at {}", path.display());
            Map::new()
        };

        if migrations::run(&mut raw) || !path.exists() {
            store.write_raw(&raw)?;
        }

        info!("Store opened at {}", path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one top-level key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let raw = self.read_raw()?;
        match raw.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Replace one top-level key.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut raw = self.read_raw()?;
        raw.insert(key.to_string(), serde_json::to_value(value)?);
        self.write_raw(&raw)
    }

    /// Remove one top-level key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut raw = self.read_raw()?;
        if raw.remove(key).is_none() {
            return Ok(false);
        }
        self.write_raw(&raw)?;
        Ok(true)
    }

    /// Run a read-only view over the typed document under the lock.
    pub fn with_doc<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Document) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let doc = self.read_doc()?;
        f(&doc)
    }

    /// Read-modify-write of the typed document under the lock.
    ///
    /// The document is written back only when `f` succeeds.
    pub fn with_doc_mut<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut Document) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut doc = self.read_doc()?;
        let out = f(&mut doc)?;
        let raw = match serde_json::to_value(&doc).map_err(StoreError::from)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::NotAnObject.into()),
        };
        self.write_raw(&raw)?;
        Ok(out)
    }

    fn read_doc(&self) -> Result<Document> {
        let raw = self.read_raw()?;
        Ok(serde_json::from_value(Value::Object(raw))?)
    }

    fn read_raw(&self) -> Result<Map<String, Value>> {
        let bytes = fs::read(&self.path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice(&bytes)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject),
        }
    }

    fn write_raw(&self, raw: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(raw)?;
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        trace!("Store flushed {} bytes", bytes.len());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
