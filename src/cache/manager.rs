//! TTL-aware response cache backed by memory and JSON files
//!
//! Provides a `CacheStore` keyed by request fingerprint. Entries are kept in
//! memory for fast reads and mirrored to disk so they survive a restart for as
//! long as they are fresh.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::api::RequestFingerprint;

/// How long an entry stays fresh, in seconds
pub const DEFAULT_TTL_SECS: i64 = 5 * 60;

/// Errors that can occur when persisting cache entries
#[derive(Debug, Error)]
pub enum CacheError {
    /// Directory creation, write or rename failed
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded
    #[error("Failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Wrapper stored in memory and on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached payload
    payload: T,
    /// When the payload was stored, as epoch milliseconds on disk
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.timestamp <= ttl
    }
}

/// A fresh cache hit
#[derive(Debug, Clone, PartialEq)]
pub struct CachedData<T> {
    /// The cached payload
    pub data: T,
    /// When the payload was stored
    pub cached_at: DateTime<Utc>,
}

/// Process-wide response cache
///
/// Stale entries are never returned: a lookup that finds one evicts it and
/// reports a miss. When a directory is configured every entry is also written
/// to `<dir>/<fingerprint>.json` as `{ "payload": ..., "timestamp": ... }`.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Directory for persisted entries, `None` for memory only
    cache_dir: Option<PathBuf>,
    /// Maximum entry age
    ttl: Duration,
    entries: Mutex<HashMap<RequestFingerprint, CacheEntry<T>>>,
    /// Suffix source for temporary files
    write_seq: AtomicU64,
}

impl<T> CacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Creates a store in the XDG cache directory (`~/.cache/stockchat/` on Linux)
    ///
    /// Falls back to a memory-only store when no home directory can be
    /// determined.
    pub fn new() -> Self {
        match default_cache_dir() {
            Some(dir) => Self::with_dir(dir),
            None => Self::in_memory(),
        }
    }

    /// Creates a store persisting to a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self::build(Some(cache_dir))
    }

    /// Creates a store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self::build(None)
    }

    fn build(cache_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            entries: Mutex::new(HashMap::new()),
            write_seq: AtomicU64::new(0),
        }
    }

    /// Overrides the freshness window
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The freshness window
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Directory entries are persisted to, if any
    pub fn dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestFingerprint, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the path of the file for a fingerprint
    fn cache_path(dir: &Path, key: &RequestFingerprint) -> PathBuf {
        dir.join(format!("{}.json", key.as_str()))
    }

    /// Looks up a fresh entry
    ///
    /// # Returns
    /// * `Some(CachedData)` if an entry exists and is within the TTL
    /// * `None` if there is no entry, it is stale (and now evicted), or the
    ///   persisted file cannot be parsed (and is now removed)
    pub fn get(&self, key: &RequestFingerprint) -> Option<CachedData<T>> {
        let now = Utc::now();

        {
            let mut entries = self.lock();
            if let Some(entry) = entries.get(key) {
                if entry.is_fresh(now, self.ttl) {
                    tracing::debug!(fingerprint = %key, "cache hit");
                    return Some(CachedData {
                        data: entry.payload.clone(),
                        cached_at: entry.timestamp,
                    });
                }
                tracing::debug!(fingerprint = %key, "evicting stale entry");
                entries.remove(key);
                // Under the lock: a put replacing this entry writes its file
                // only after inserting, so it cannot be deleted here.
                self.remove_file(key);
                return None;
            }
        }

        let entry = self.read_file(key, now)?;
        if !entry.is_fresh(now, self.ttl) {
            tracing::debug!(fingerprint = %key, "evicting stale persisted entry");
            self.evict_persisted(key, now);
            return None;
        }

        tracing::debug!(fingerprint = %key, "cache hit (disk)");
        let hit = CachedData {
            data: entry.payload.clone(),
            cached_at: entry.timestamp,
        };
        // A put that raced this read wins
        self.lock().entry(key.clone()).or_insert(entry);
        Some(hit)
    }

    /// Stores `payload` with a fresh timestamp, replacing any previous entry
    ///
    /// The memory entry is always updated; an error means only the disk copy
    /// could not be written.
    pub fn put(&self, key: &RequestFingerprint, payload: &T) -> Result<(), CacheError> {
        let entry = CacheEntry {
            payload: payload.clone(),
            timestamp: Utc::now(),
        };
        self.lock().insert(key.clone(), entry.clone());
        tracing::debug!(fingerprint = %key, "cache store");

        match &self.cache_dir {
            Some(dir) => self.write_file(dir, key, &entry),
            None => Ok(()),
        }
    }

    /// Removes every entry, in memory and on disk
    ///
    /// Only files named like fingerprints are deleted, so unrelated files in
    /// the directory are left alone.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.lock().clear();

        let Some(dir) = &self.cache_dir else {
            return Ok(());
        };
        let listing = match fs::read_dir(dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        for item in listing {
            let path = item?.path();
            let is_entry = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(RequestFingerprint::from_hex)
                    .is_some();
            if is_entry {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        tracing::debug!(removed, dir = %dir.display(), "cache cleared");
        Ok(())
    }

    /// Writes an entry via a temporary file and rename so readers never see a
    /// partial file
    fn write_file(
        &self,
        dir: &Path,
        key: &RequestFingerprint,
        entry: &CacheEntry<T>,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(dir)?;
        let json = serde_json::to_vec(entry)?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = dir.join(format!(
            "{}.{}-{}.tmp",
            key.as_str(),
            std::process::id(),
            seq
        ));
        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, Self::cache_path(dir, key)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_file(&self, key: &RequestFingerprint, now: DateTime<Utc>) -> Option<CacheEntry<T>> {
        let dir = self.cache_dir.as_ref()?;
        let content = fs::read(Self::cache_path(dir, key)).ok()?;
        match serde_json::from_slice(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(fingerprint = %key, error = %e, "discarding unreadable entry");
                self.evict_persisted(key, now);
                None
            }
        }
    }

    /// Deletes the file for `key` unless a fresh entry was stored after it
    /// was read
    ///
    /// `put` inserts into memory before writing its file, so checking memory
    /// under the lock is enough to keep a newer file.
    fn evict_persisted(&self, key: &RequestFingerprint, now: DateTime<Utc>) {
        let entries = self.lock();
        let replaced = entries
            .get(key)
            .is_some_and(|entry| entry.is_fresh(now, self.ttl));
        if !replaced {
            self.remove_file(key);
        }
    }

    fn remove_file(&self, key: &RequestFingerprint) {
        if let Some(dir) = &self.cache_dir {
            let _ = fs::remove_file(Self::cache_path(dir, key));
        }
    }
}

impl<T> Default for CacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

/// XDG cache directory for the application, if a home directory exists
pub fn default_cache_dir() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "stockchat")?;
    Some(project_dirs.cache_dir().to_path_buf())
}
