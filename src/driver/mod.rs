//! Driver Module
//!
//! The cache driver contract shared by every backend, plus the closed set of
//! backends the registry can construct.
//!
//! Every backend stores the JSON encoding of a value under `<prefix><key>`.
//! Expired entries behave exactly like entries that were never written.

mod file;
mod memcached;
mod memory;
mod record;

#[cfg(test)]
mod property_tests;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

// Re-export public types
pub use file::FileDriver;
#[cfg(feature = "memcached")]
pub use memcached::connect;
pub use memcached::{MemcachedDriver, ObjectClient};
pub use memory::{MemoryDriver, MemoryEntry, MemoryStore};
pub use record::{decode_record, encode_record, expires_at, now_timestamp, TIMESTAMP_WIDTH};

// == Public Constants ==
/// TTL applied by `set_default` and `remember_default`
pub const DEFAULT_TTL_MINUTES: i64 = 60;

// == Driver Trait ==
/// Capability every cache backend provides.
///
/// The four primitives are backend specific; `get` and `remember` are built
/// on top of them once for all backends.
pub trait Driver {
    /// Returns true iff a live entry exists for `key`.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Returns the stored value, or `None` if missing or expired.
    fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

    /// Stores `value` until `now + ttl_minutes * 60` seconds.
    ///
    /// Zero or negative TTLs are accepted. `Ok(false)` reports a write that did
    /// not complete.
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_minutes: i64) -> Result<bool>;

    /// Removes the entry. Idempotent: a missing entry is still a success.
    fn forget(&self, key: &str) -> Result<bool>;

    // == Get ==
    /// Returns the stored value, or the result of `default` on a miss.
    ///
    /// `default` only runs on a miss and its result is not stored.
    fn get<T, F>(&self, key: &str, default: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        match self.retrieve(key)? {
            Some(value) => Ok(value),
            None => Ok(default()),
        }
    }

    // == Remember ==
    /// Read-through fetch: on a miss, computes `default`, stores it for
    /// `ttl_minutes` and returns it. On a hit `default` never runs.
    fn remember<T, F>(&self, key: &str, ttl_minutes: i64, default: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.retrieve(key)? {
            debug!("Cache hit for {:?}", key);
            return Ok(value);
        }

        debug!("Cache miss for {:?}, computing value", key);
        let value = default();
        if !self.set(key, &value, ttl_minutes)? {
            warn!("Computed value for {:?} could not be stored", key);
        }

        Ok(value)
    }

    /// `set` with [`DEFAULT_TTL_MINUTES`].
    fn set_default<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        self.set(key, value, DEFAULT_TTL_MINUTES)
    }

    /// `remember` with [`DEFAULT_TTL_MINUTES`].
    fn remember_default<T, F>(&self, key: &str, default: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.remember(key, DEFAULT_TTL_MINUTES, default)
    }
}

// == Payload Codec ==
/// Serializes a value into the payload bytes every backend stores.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserializes payload bytes written by [`encode`].
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

// == Driver Kind ==
/// Names the registry can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    /// Local filesystem, one file per key
    File,
    /// In-process memory (also resolved as `apc`)
    Memory,
    /// Networked memcached (resolved as `memcache` or `memcached`)
    Memcached,
}

impl DriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverKind::File => "file",
            DriverKind::Memory => "memory",
            DriverKind::Memcached => "memcached",
        }
    }
}

impl FromStr for DriverKind {
    type Err = CacheError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(DriverKind::File),
            "memory" | "apc" => Ok(DriverKind::Memory),
            "memcache" | "memcached" => Ok(DriverKind::Memcached),
            _ => Err(CacheError::UnsupportedDriver(name.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Driver ==
/// One constructed backend.
#[derive(Debug)]
pub enum CacheDriver {
    File(FileDriver),
    Memory(MemoryDriver),
    Memcached(MemcachedDriver),
}

impl CacheDriver {
    pub fn kind(&self) -> DriverKind {
        match self {
            CacheDriver::File(_) => DriverKind::File,
            CacheDriver::Memory(_) => DriverKind::Memory,
            CacheDriver::Memcached(_) => DriverKind::Memcached,
        }
    }

    /// Key prefix this driver namespaces every key with.
    pub fn prefix(&self) -> &str {
        match self {
            CacheDriver::File(d) => d.prefix(),
            CacheDriver::Memory(d) => d.prefix(),
            CacheDriver::Memcached(d) => d.prefix(),
        }
    }
}

impl Driver for CacheDriver {
    fn exists(&self, key: &str) -> Result<bool> {
        match self {
            CacheDriver::File(d) => d.exists(key),
            CacheDriver::Memory(d) => d.exists(key),
            CacheDriver::Memcached(d) => d.exists(key),
        }
    }

    fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self {
            CacheDriver::File(d) => d.retrieve(key),
            CacheDriver::Memory(d) => d.retrieve(key),
            CacheDriver::Memcached(d) => d.retrieve(key),
        }
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_minutes: i64) -> Result<bool> {
        match self {
            CacheDriver::File(d) => d.set(key, value, ttl_minutes),
            CacheDriver::Memory(d) => d.set(key, value, ttl_minutes),
            CacheDriver::Memcached(d) => d.set(key, value, ttl_minutes),
        }
    }

    fn forget(&self, key: &str) -> Result<bool> {
        match self {
            CacheDriver::File(d) => d.forget(key),
            CacheDriver::Memory(d) => d.forget(key),
            CacheDriver::Memcached(d) => d.forget(key),
        }
    }
}

impl From<FileDriver> for CacheDriver {
    fn from(driver: FileDriver) -> Self {
        CacheDriver::File(driver)
    }
}

impl From<MemoryDriver> for CacheDriver {
    fn from(driver: MemoryDriver) -> Self {
        CacheDriver::Memory(driver)
    }
}

impl From<MemcachedDriver> for CacheDriver {
    fn from(driver: MemcachedDriver) -> Self {
        CacheDriver::Memcached(driver)
    }
}
