//! Memory Driver Module
//!
//! In-process cache driver backed by a shared HashMap with per-entry
//! millisecond expiry. Expired entries are dropped lazily on access or in
//! bulk through `purge_expired`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{decode, encode, Driver};
use crate::error::Result;

// == Memory Entry ==
/// A single stored payload with its expiry.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    /// Encoded value
    pub payload: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: i64,
}

impl MemoryEntry {
    /// Creates an entry expiring `ttl_minutes` from now.
    pub fn new(payload: Vec<u8>, ttl_minutes: i64) -> Self {
        let expires_at = current_timestamp_ms().saturating_add(ttl_minutes.saturating_mul(60_000));

        Self {
            payload,
            expires_at,
        }
    }

    /// Expired once the current time is greater than or equal to the
    /// expiration time.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }
}

/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// == Memory Store ==
/// Shared in-process storage medium. Cloning yields another handle to the
/// same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());

        let removed = before - entries.len();
        if removed > 0 {
            debug!("Memory cache purge: removed {} expired entries", removed);
        }
        removed
    }
}

// == Memory Driver ==
/// In-process cache driver.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    prefix: String,
    store: MemoryStore,
}

impl MemoryDriver {
    /// Creates a driver over a fresh, private store.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_store(prefix, MemoryStore::new())
    }

    /// Creates a driver over an existing store, shared with other drivers.
    pub fn with_store(prefix: impl Into<String>, store: MemoryStore) -> Self {
        Self {
            prefix: prefix.into(),
            store,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    // == Fetch ==
    /// Returns the live payload for `key`, dropping it if expired.
    fn fetch(&self, key: &str) -> Option<Vec<u8>> {
        let key = self.namespaced(key);

        {
            let entries = self.store.read();
            match entries.get(&key) {
                Some(entry) if !entry.is_expired() => return Some(entry.payload.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Re-check under the write lock; a concurrent set may have replaced it
        let mut entries = self.store.write();
        if entries.get(&key).is_some_and(MemoryEntry::is_expired) {
            entries.remove(&key);
            debug!("Memory cache entry {:?} expired", key);
        }
        None
    }
}

impl Driver for MemoryDriver {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.fetch(key).is_some())
    }

    fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.fetch(key) {
            Some(payload) => Ok(Some(decode(&payload)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_minutes: i64) -> Result<bool> {
        let entry = MemoryEntry::new(encode(value)?, ttl_minutes);
        self.store.write().insert(self.namespaced(key), entry);
        Ok(true)
    }

    fn forget(&self, key: &str) -> Result<bool> {
        self.store.write().remove(&self.namespaced(key));
        Ok(true)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let before = current_timestamp_ms();
        let entry = MemoryEntry::new(b"1".to_vec(), 1);

        assert!(entry.expires_at >= before + 60_000);
        assert!(entry.expires_at <= current_timestamp_ms() + 60_000);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = MemoryEntry {
            payload: Vec::new(),
            expires_at: current_timestamp_ms(), // Expires exactly now
        };

        assert!(entry.is_expired(), "Entry should be expired at boundary");
    }

    #[test]
    fn test_set_and_retrieve() {
        let driver = MemoryDriver::new("mem_");

        assert!(driver.set("key1", &"value1", 60).unwrap());
        assert_eq!(driver.retrieve::<String>("key1").unwrap().as_deref(), Some("value1"));
        assert!(driver.exists("key1").unwrap());
        assert_eq!(driver.store().len(), 1);
    }

    #[test]
    fn test_retrieve_nonexistent() {
        let driver = MemoryDriver::new("mem_");

        assert_eq!(driver.retrieve::<String>("nonexistent").unwrap(), None);
        assert!(!driver.exists("nonexistent").unwrap());
    }

    #[test]
    fn test_overwrite() {
        let driver = MemoryDriver::new("mem_");

        driver.set("key1", &"value1", 60).unwrap();
        driver.set("key1", &"value2", 60).unwrap();

        assert_eq!(driver.retrieve::<String>("key1").unwrap().as_deref(), Some("value2"));
        assert_eq!(driver.store().len(), 1);
    }

    #[test]
    fn test_forget_is_idempotent() {
        let driver = MemoryDriver::new("mem_");
        driver.set("key1", &1, 60).unwrap();

        assert!(driver.forget("key1").unwrap());
        assert!(driver.forget("key1").unwrap());
        assert!(!driver.exists("key1").unwrap());
        assert!(driver.store().is_empty());
    }

    #[test]
    fn test_zero_ttl_expires_immediately_and_is_dropped() {
        let driver = MemoryDriver::new("mem_");

        assert!(driver.set("gone", &"value", 0).unwrap());
        assert_eq!(driver.store().len(), 1);

        assert!(!driver.exists("gone").unwrap());
        assert!(driver.store().is_empty());
    }

    #[test]
    fn test_shared_store_prefix_isolation() {
        let store = MemoryStore::new();
        let a = MemoryDriver::with_store("a_", store.clone());
        let b = MemoryDriver::with_store("b_", store.clone());

        a.set("key", &"from a", 60).unwrap();
        b.set("key", &"from b", 60).unwrap();

        assert_eq!(a.retrieve::<String>("key").unwrap().as_deref(), Some("from a"));
        assert_eq!(b.retrieve::<String>("key").unwrap().as_deref(), Some("from b"));
        assert_eq!(store.len(), 2);

        b.forget("key").unwrap();
        assert!(a.exists("key").unwrap());
    }

    #[test]
    fn test_purge_expired() {
        let driver = MemoryDriver::new("mem_");

        driver.set("key1", &1, -1).unwrap();
        driver.set("key2", &2, 0).unwrap();
        driver.set("key3", &3, 10).unwrap();

        assert_eq!(driver.store().purge_expired(), 2);
        assert_eq!(driver.store().len(), 1);
        assert!(driver.exists("key3").unwrap());
    }
}
