//! Registry Module
//!
//! Resolves driver names to long-lived driver instances and exposes a facade
//! that forwards the driver contract to the configured default driver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::driver::{
    CacheDriver, Driver, DriverKind, FileDriver, MemcachedDriver, MemoryDriver, MemoryStore,
    ObjectClient,
};
use crate::error::Result;

// == Registry ==
/// Caller-owned map from driver kind to its single driver instance.
///
/// Drivers are constructed on first resolution and kept for the lifetime of
/// the registry. A failed construction caches nothing.
pub struct Registry {
    config: Config,
    drivers: Mutex<HashMap<DriverKind, Arc<CacheDriver>>>,
    /// Storage medium backing the memory driver
    memory_store: MemoryStore,
    /// Pre-connected client for the memcached driver, consumed on first use
    object_client: Mutex<Option<Box<dyn ObjectClient>>>,
}

impl Registry {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            drivers: Mutex::new(HashMap::new()),
            memory_store: MemoryStore::new(),
            object_client: Mutex::new(None),
        }
    }

    /// Supplies an already connected client for the memcached driver.
    pub fn with_object_client(self, client: Box<dyn ObjectClient>) -> Self {
        *self
            .object_client
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(client);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // == Resolve ==
    /// Returns the driver for `name`, constructing it on first use.
    ///
    /// An empty name resolves the configured default driver. Unknown names
    /// fail with [`CacheError::UnsupportedDriver`].
    pub fn resolve(&self, name: &str) -> Result<Arc<CacheDriver>> {
        let name = if name.trim().is_empty() {
            self.config.default_driver.as_str()
        } else {
            name
        };
        let kind: DriverKind = name.parse()?;

        let mut drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(driver) = drivers.get(&kind) {
            return Ok(Arc::clone(driver));
        }

        let driver = Arc::new(self.construct(kind)?);
        info!("Cache driver [{}] loaded", kind);
        drivers.insert(kind, Arc::clone(&driver));

        Ok(driver)
    }

    /// Returns whether the driver for `kind` has been constructed.
    pub fn is_loaded(&self, kind: DriverKind) -> bool {
        self.drivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }

    fn construct(&self, kind: DriverKind) -> Result<CacheDriver> {
        let prefix = self.config.prefix.clone();

        match kind {
            DriverKind::File => Ok(FileDriver::new(prefix, &self.config.path)?.into()),
            DriverKind::Memory => {
                Ok(MemoryDriver::with_store(prefix, self.memory_store.clone()).into())
            }
            DriverKind::Memcached => {
                let client = self.object_client()?;
                Ok(MemcachedDriver::new(prefix, client).into())
            }
        }
    }

    fn object_client(&self) -> Result<Box<dyn ObjectClient>> {
        let injected = self
            .object_client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = injected {
            return Ok(client);
        }

        #[cfg(feature = "memcached")]
        let client = crate::driver::connect(&self.config.memcached_servers)
            .map(|client| Box::new(client) as Box<dyn ObjectClient>);

        #[cfg(not(feature = "memcached"))]
        let client = Err(crate::error::CacheError::Connection(
            "no memcached client supplied and the `memcached` feature is disabled".to_string(),
        ));

        client
    }
}

// == Cache Facade ==
/// Entry point for applications: resolves named drivers and forwards the
/// driver contract to the default one.
pub struct Cache {
    registry: Registry,
}

impl Cache {
    pub fn new(config: Config) -> Self {
        Self::with_registry(Registry::new(config))
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Driver registered under `name`.
    pub fn driver(&self, name: &str) -> Result<Arc<CacheDriver>> {
        self.registry.resolve(name)
    }

    /// The configured default driver.
    pub fn default_driver(&self) -> Result<Arc<CacheDriver>> {
        self.registry.resolve("")
    }
}

impl Driver for Cache {
    fn exists(&self, key: &str) -> Result<bool> {
        self.default_driver()?.exists(key)
    }

    fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.default_driver()?.retrieve(key)
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_minutes: i64) -> Result<bool> {
        self.default_driver()?.set(key, value, ttl_minutes)
    }

    fn forget(&self, key: &str) -> Result<bool> {
        self.default_driver()?.forget(key)
    }
}
