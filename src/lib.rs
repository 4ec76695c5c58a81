//! Cachefront - A small caching facade
//!
//! One driver contract (`exists`, `retrieve`, `set`, `forget`, plus the
//! derived `get` and `remember`) over interchangeable TTL backends: local
//! files, in-process memory and networked memcached.

pub mod config;
pub mod driver;
pub mod error;
pub mod registry;

pub use config::Config;
pub use driver::{CacheDriver, Driver, DriverKind, DEFAULT_TTL_MINUTES};
pub use error::{CacheError, Result};
pub use registry::{Cache, Registry};
