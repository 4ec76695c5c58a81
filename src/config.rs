//! Configuration Module
//!
//! Handles loading the cache facade configuration from environment variables.

use std::env;
use std::path::PathBuf;

use tracing::warn;

/// Default memcached port
pub const DEFAULT_MEMCACHED_PORT: u16 = 11211;

/// Default relative weight of a memcached server in the pool
pub const DEFAULT_SERVER_WEIGHT: u32 = 100;

// == Server Config ==
/// One networked cache server in the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Relative weight in the pool. The memcache client distributes keys by hash
    /// and does not consult it.
    pub weight: u32,
}

impl ServerConfig {
    /// Parses `host:port[:weight]`.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.trim().split(':');
        let host = parts.next().filter(|h| !h.is_empty())?.to_string();
        let port = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => DEFAULT_MEMCACHED_PORT,
        };
        let weight = match parts.next() {
            Some(w) => w.parse().ok()?,
            None => DEFAULT_SERVER_WEIGHT,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self { host, port, weight })
    }

    /// Connection URL understood by the memcache client.
    pub fn url(&self) -> String {
        format!("memcache://{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_MEMCACHED_PORT,
            weight: DEFAULT_SERVER_WEIGHT,
        }
    }
}

/// Cache facade configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Driver used when no driver name is given
    pub default_driver: String,
    /// Application prefix prepended to every key
    pub prefix: String,
    /// Directory for the file driver
    pub path: PathBuf,
    /// Server pool for the memcached driver
    pub memcached_servers: Vec<ServerConfig>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DRIVER` - Default driver name (default: file)
    /// - `CACHE_PREFIX` - Key prefix (default: cachefront_)
    /// - `CACHE_PATH` - File driver directory (default: <tmp>/cachefront)
    /// - `MEMCACHED_SERVERS` - Comma separated `host:port[:weight]` list
    ///   (default: 127.0.0.1:11211:100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_driver: env::var("CACHE_DRIVER")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_driver),
            prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.prefix),
            path: env::var("CACHE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            memcached_servers: env::var("MEMCACHED_SERVERS")
                .ok()
                .map(|v| parse_servers(&v))
                .filter(|servers| !servers.is_empty())
                .unwrap_or(defaults.memcached_servers),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_driver: "file".to_string(),
            prefix: "cachefront_".to_string(),
            path: env::temp_dir().join("cachefront"),
            memcached_servers: vec![ServerConfig::default()],
        }
    }
}

/// Parses a comma separated server list, skipping malformed entries.
pub fn parse_servers(list: &str) -> Vec<ServerConfig> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| {
            let server = ServerConfig::parse(s);
            if server.is_none() {
                warn!("Ignoring malformed memcached server entry: {:?}", s);
            }
            server
        })
        .collect()
}
