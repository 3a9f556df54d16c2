//! Per-session asset byte cache.
//!
//! Module images are staged here before any code loading starts, so loading
//! never interleaves with network I/O. The cache is append-only: the first
//! write of a key wins and nothing is ever removed during a session.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

/// Append-only map from asset key to payload.
#[derive(Debug, Default)]
pub struct AssetByteCache {
    entries: HashMap<String, Bytes>,
    /// Keys that were requested during staging but could not be found.
    missing: Vec<String>,
}

impl AssetByteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` under `key` unless the key is already present.
    ///
    /// Returns `false` when the existing value was kept.
    pub fn put(&mut self, key: impl Into<String>, bytes: Bytes) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            debug!(key = %key, "asset already staged, keeping first copy");
            return false;
        }
        self.entries.insert(key, bytes);
        true
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    /// Payload for `key`, or an empty payload when absent.
    pub fn get_or_empty(&self, key: &str) -> (Bytes, bool) {
        match self.entries.get(key) {
            Some(b) => (b.clone(), true),
            None => (Bytes::new(), false),
        }
    }

    /// Records that `key` could not be staged.
    pub fn record_missing(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.missing.contains(&key) {
            self.missing.push(key);
        }
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}
