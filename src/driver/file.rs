//! File Driver Module
//!
//! Stores one file per key inside a configured directory. Each file holds a
//! 10-byte expiry header followed by the JSON payload; expiry is checked, and
//! expired files removed, lazily on read.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::record::{decode_record, encode_record, expires_at, is_expired};
use super::{decode, encode, Driver};
use crate::error::{CacheError, Result};

// == File Driver ==
/// Filesystem backed cache driver.
#[derive(Debug, Clone)]
pub struct FileDriver {
    /// Prepended to every key to form the file name
    prefix: String,
    /// Canonical, verified-writable storage directory
    path: PathBuf,
}

impl FileDriver {
    // == Constructor ==
    /// Creates a driver storing files under `path`.
    ///
    /// The directory is created if missing, canonicalized, and verified
    /// writable by creating and removing a probe file. Any failure yields
    /// [`CacheError::StorageNotWritable`].
    pub fn new(prefix: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let requested = path.as_ref();

        if !requested.is_dir() {
            fs::create_dir_all(requested).map_err(|source| CacheError::StorageNotWritable {
                path: requested.to_path_buf(),
                source,
            })?;
        }

        let path = fs::canonicalize(requested).map_err(|source| {
            CacheError::StorageNotWritable {
                path: requested.to_path_buf(),
                source,
            }
        })?;

        if let Err(source) = probe_writable(&path) {
            return Err(CacheError::StorageNotWritable { path, source });
        }

        let prefix = prefix.into();
        info!("File cache driver ready at {} (prefix {:?})", path.display(), prefix);

        Ok(Self { prefix, path })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Canonical storage directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File backing `key`: `<dir>/<prefix><key>`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.path.join(format!("{}{}", self.prefix, key))
    }

    // == Read Payload ==
    /// Reads the live payload for `key`, removing the file if it is expired
    /// or corrupt.
    fn read_payload(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);

        let bytes = match read_locked(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e)),
        };

        // freshly created by a writer that has not taken its lock yet
        if bytes.is_empty() {
            return Ok(None);
        }

        match decode_record(&bytes) {
            None => {
                warn!("Corrupt cache record at {}, removing", path.display());
                self.forget(key)?;
                Ok(None)
            }
            Some((expires, _)) if is_expired(expires) => {
                debug!("Cache entry {:?} expired at {}", key, expires);
                self.forget(key)?;
                Ok(None)
            }
            Some((_, payload)) => Ok(Some(payload.to_vec())),
        }
    }

    // == Purge Expired ==
    /// Removes every expired or corrupt file carrying this driver's prefix.
    ///
    /// Returns the number of files removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0;

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_ours = name
                .to_str()
                .is_some_and(|n| n.starts_with(&self.prefix) && n.len() > self.prefix.len());
            if !is_ours || !entry.file_type()?.is_file() {
                continue;
            }

            let stale = match read_locked(&entry.path()) {
                Ok(bytes) if bytes.is_empty() => continue,
                Ok(bytes) => decode_record(&bytes).map_or(true, |(expires, _)| is_expired(expires)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CacheError::Io(e)),
            };

            if stale && remove_quietly(&entry.path()) {
                removed += 1;
            }
        }

        if removed > 0 {
            info!("File cache purge: removed {} expired entries", removed);
        }
        Ok(removed)
    }
}

impl Driver for FileDriver {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.read_payload(key)?.is_some())
    }

    fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_payload(key)? {
            Some(payload) => Ok(Some(decode(&payload)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_minutes: i64) -> Result<bool> {
        let record = encode_record(expires_at(ttl_minutes), &encode(value)?);
        let path = self.path_for(key);

        match write_locked(&path, &record) {
            Ok(written) => Ok(written > 0),
            Err(e) => {
                warn!("Failed to write cache file {}: {}", path.display(), e);
                Ok(false)
            }
        }
    }

    fn forget(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed cache file {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => {
                warn!("Failed to remove cache file {}: {}", path.display(), e);
                Ok(false)
            }
        }
    }
}

// == Helpers ==
/// Creates and deletes a probe file; `is_dir`/permission bits alone are not
/// trusted to mean the directory accepts writes.
fn probe_writable(dir: &Path) -> io::Result<()> {
    let probe = dir.join(format!(
        ".write-probe-{}-{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    OpenOptions::new().append(true).create(true).open(&probe)?;

    if let Err(e) = fs::remove_file(&probe) {
        warn!("Could not remove write probe {}: {}", probe.display(), e);
    }
    Ok(())
}

/// Reads the whole file while holding a shared lock.
fn read_locked(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    FileExt::lock_shared(&file)?;

    let mut buf = Vec::new();
    let result = file.read_to_end(&mut buf);
    let _ = FileExt::unlock(&file);

    result.map(|_| buf)
}

/// Replaces the file contents with `buf` while holding an exclusive lock.
///
/// Truncation happens after the lock is taken so concurrent lockers never see
/// a partially written record.
fn write_locked(path: &Path, buf: &[u8]) -> io::Result<usize> {
    write_locked_with(path, buf, |file, buf| file.write_all(buf))
}

/// `write_locked` with the body write supplied by the caller.
///
/// A failed write leaves the file empty, which readers report as absent,
/// rather than a valid header over a truncated payload.
fn write_locked_with<F>(path: &Path, buf: &[u8], write: F) -> io::Result<usize>
where
    F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    FileExt::lock_exclusive(&file)?;

    let result = file
        .set_len(0)
        .and_then(|_| write(&mut file, buf))
        .and_then(|_| file.flush());

    if result.is_err() {
        if let Err(e) = file.set_len(0) {
            warn!("Could not discard partial record {}: {}", path.display(), e);
            remove_quietly(path);
        }
    }
    let _ = FileExt::unlock(&file);

    result.map(|_| buf.len())
}

fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            false
        }
    }
}
