#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Content-addressed JSON cache.
//!
//! Entries are keyed by the SHA-256 of the canonical JSON form of a key
//! payload (object keys sorted recursively, no insignificant whitespace),
//! so logically equal payloads always map to the same key regardless of
//! field order. Each entry lives at `<root>/<key[0..2]>/<key>.json`.
//!
//! Writes go to a temporary file in the shard directory and are renamed
//! into place, so concurrent writers of the same key never leave a
//! partially written entry behind.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or a stored entry's JSON failed.
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The key is not a lowercase hex digest of at least two characters.
    #[error("Invalid cache key '{key}'")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },
}

/// A cache rooted at a filesystem directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at `root`. The directory is created lazily
    /// on the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the key of `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Json`] if `payload` cannot be serialized.
    pub fn make_key<T: Serialize + ?Sized>(payload: &T) -> Result<String, CacheError> {
        let value = serde_json::to_value(payload)?;
        let canonical = serde_json::to_string(&canonicalize(value))?;
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    /// Path an entry for `key` is stored at.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] for malformed keys.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        validate_key(key)?;
        Ok(self.root.join(&key[..2]).join(format!("{key}.json")))
    }

    /// Stores `value` under `key`, replacing any previous entry, and
    /// returns the entry path.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the key is invalid, serialization fails,
    /// or the entry cannot be written.
    pub fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf, CacheError> {
        let path = self.entry_path(key)?;
        let shard = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(shard)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{key}."))
            .suffix(".tmp")
            .tempfile_in(shard)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;

        log::debug!("Cached {key} at {}", path.display());
        Ok(path)
    }

    /// Loads the entry for `key`. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the key is invalid, the entry cannot be
    /// read, or it is not valid JSON.
    pub fn load_json(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let path = self.entry_path(key)?;
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    let valid = key.len() >= 2
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidKey {
            key: key.to_string(),
        })
    }
}

/// Rebuilds `value` with every object's keys inserted in sorted order.
fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(canonicalize).collect())
        }
        other => other,
    }
}
