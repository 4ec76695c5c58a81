//! Memcached Driver Module
//!
//! Adapter over a networked memory-object cache. Expiry is delegated to the
//! service's native TTL, so no local bookkeeping happens here.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::Driver;
use crate::error::Result;

// == Object Client ==
/// The subset of a networked cache client the adapter needs.
///
/// Implementations are already connected; connection setup is not the
/// adapter's concern.
pub trait ObjectClient: Send + Sync {
    /// Returns the stored payload, or `None` when the service reports a miss.
    fn fetch(&self, key: &str) -> Result<Option<String>>;

    /// Stores `payload` with the service's native TTL in seconds.
    /// 0 means "never expires" for memcached, and values above 2_592_000
    /// (30 days) are read by memcached as an absolute UNIX timestamp, so such
    /// entries are already expired when stored.
    fn store(&self, key: &str, payload: &str, ttl_seconds: u32) -> Result<()>;

    /// Deletes `key`, returning whether the service held it.
    fn delete(&self, key: &str) -> Result<bool>;
}

// == Memcached Driver ==
pub struct MemcachedDriver {
    prefix: String,
    client: Box<dyn ObjectClient>,
}

impl MemcachedDriver {
    pub fn new(prefix: impl Into<String>, client: Box<dyn ObjectClient>) -> Self {
        Self {
            prefix: prefix.into(),
            client,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

impl fmt::Debug for MemcachedDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedDriver")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl Driver for MemcachedDriver {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.client.fetch(&self.namespaced(key))?.is_some())
    }

    fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.client.fetch(&self.namespaced(key))? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_minutes: i64) -> Result<bool> {
        let payload = serde_json::to_string(value)?;
        let ttl_seconds = ttl_minutes.saturating_mul(60);

        // memcached has no notion of a negative TTL; the entry is already
        // expired, which is the same as it being absent
        if ttl_seconds < 0 {
            debug!("Negative TTL for {:?}, deleting instead of storing", key);
            return self.forget(key);
        }
        let ttl_seconds = u32::try_from(ttl_seconds).unwrap_or(u32::MAX);

        match self.client.store(&self.namespaced(key), &payload, ttl_seconds) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Failed to store {:?} in memcached: {}", key, e);
                Ok(false)
            }
        }
    }

    fn forget(&self, key: &str) -> Result<bool> {
        match self.client.delete(&self.namespaced(key)) {
            Ok(held) => {
                if !held {
                    debug!("Memcached held no entry for {:?}", key);
                }
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to delete {:?} from memcached: {}", key, e);
                Ok(false)
            }
        }
    }
}

// == Memcache Client ==
#[cfg(feature = "memcached")]
mod client {
    use tracing::info;

    use super::ObjectClient;
    use crate::config::ServerConfig;
    use crate::error::{CacheError, Result};

    fn backend_error(e: memcache::MemcacheError) -> CacheError {
        CacheError::Backend(e.to_string())
    }

    impl ObjectClient for memcache::Client {
        fn fetch(&self, key: &str) -> Result<Option<String>> {
            self.get::<String>(key).map_err(backend_error)
        }

        fn store(&self, key: &str, payload: &str, ttl_seconds: u32) -> Result<()> {
            memcache::Client::set(self, key, payload, ttl_seconds).map_err(backend_error)
        }

        fn delete(&self, key: &str) -> Result<bool> {
            memcache::Client::delete(self, key).map_err(backend_error)
        }
    }

    /// Connects to the server pool and verifies it answers a version probe.
    pub fn connect(servers: &[ServerConfig]) -> Result<memcache::Client> {
        if servers.is_empty() {
            return Err(CacheError::Connection(
                "no memcached servers configured".to_string(),
            ));
        }

        let urls: Vec<String> = servers.iter().map(ServerConfig::url).collect();
        let client = memcache::Client::connect(urls.clone())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        client.version().map_err(|e| {
            CacheError::Connection(format!("Could not establish a connection to Memcached: {}", e))
        })?;

        info!("Connected to memcached pool {:?}", urls);
        Ok(client)
    }
}

#[cfg(feature = "memcached")]
pub use client::connect;
