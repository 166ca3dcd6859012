//! Injected cache-store abstraction with TTL and version invalidation.
//!
//! The dashboard treats the cache as an opaque blob of per-report entries,
//! invalidated wholesale when the build's version tag changes or an entry
//! outlives the TTL. Concurrent writers to the same key race harmlessly:
//! last write wins, and a re-fetch is cheap and idempotent.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Default entry lifetime: thirty minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// One cached report payload with its write time and version stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    /// Seconds since the Unix epoch at write time.
    pub timestamp: u64,
    pub version: String,
}

/// Validity policy applied on read.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// The current build's version tag; entries with a different tag are
    /// stale regardless of age.
    pub version: String,
    pub ttl: Duration,
}

impl CachePolicy {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn is_fresh(&self, entry: &CacheEntry, now: SystemTime) -> bool {
        if entry.version != self.version {
            return false;
        }
        let age = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .saturating_sub(entry.timestamp);
        age <= self.ttl.as_secs()
    }
}

/// Key-value cache seam. The core never depends on the storage medium.
pub trait CacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Helper: fetch a fresh entry under `policy`, falling back to a stale one
/// only when `allow_stale` is set (the fetch-failure recovery path).
pub fn cached_value(
    store: &dyn CacheStore,
    key: &str,
    policy: &CachePolicy,
    allow_stale: bool,
) -> Option<serde_json::Value> {
    let entry = store.get(key)?;
    if policy.is_fresh(&entry, SystemTime::now()) {
        return Some(entry.data);
    }
    if allow_stale {
        debug!(key, "using stale cache entry as fallback");
        return Some(entry.data);
    }
    None
}

/// Write helper stamping the current time and policy version.
pub fn store_value(
    store: &dyn CacheStore,
    key: &str,
    policy: &CachePolicy,
    data: serde_json::Value,
) -> Result<()> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    store.set(
        key,
        CacheEntry {
            data,
            timestamp,
            version: policy.version.clone(),
        },
    )
}

/// Whole-blob file persistence under one fixed cache file.
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
}

type CacheBlob = BTreeMap<String, CacheEntry>;

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_blob(&self) -> CacheBlob {
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(blob) => blob,
                Err(error) => {
                    // A corrupt blob is equivalent to an empty cache.
                    warn!(path = %self.path.display(), %error, "discarding unreadable cache blob");
                    CacheBlob::new()
                }
            },
            Err(_) => CacheBlob::new(),
        }
    }

    fn write_blob(&self, blob: &CacheBlob) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(blob)?)?;
        Ok(())
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.read_blob().get(key).cloned()
    }

    fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let mut blob = self.read_blob();
        blob.insert(key.to_string(), entry);
        self.write_blob(&blob)
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and the `--no-cache` path.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<CacheBlob>,
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), entry);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(timestamp: u64, version: &str) -> CacheEntry {
        CacheEntry {
            data: json!({"enrolled": 12}),
            timestamp,
            version: version.to_string(),
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_secs()
    }

    #[test]
    fn fresh_entry_within_ttl_and_version() {
        let policy = CachePolicy::new("v2");
        assert!(policy.is_fresh(&entry(now_secs(), "v2"), SystemTime::now()));
    }

    #[test]
    fn version_bump_invalidates() {
        let policy = CachePolicy::new("v3");
        assert!(!policy.is_fresh(&entry(now_secs(), "v2"), SystemTime::now()));
    }

    #[test]
    fn ttl_expiry_invalidates() {
        let policy = CachePolicy::new("v2");
        let old = now_secs() - DEFAULT_TTL.as_secs() - 60;
        assert!(!policy.is_fresh(&entry(old, "v2"), SystemTime::now()));
    }

    #[test]
    fn stale_fallback_only_when_allowed() {
        let store = MemoryCacheStore::default();
        let policy = CachePolicy::new("v2");
        store
            .set("summary", entry(now_secs() - DEFAULT_TTL.as_secs() - 60, "v2"))
            .expect("set entry");
        assert_eq!(cached_value(&store, "summary", &policy, false), None);
        assert_eq!(
            cached_value(&store, "summary", &policy, true),
            Some(json!({"enrolled": 12}))
        );
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileCacheStore::new(dir.path().join("dashboard-cache.json"));
        let policy = CachePolicy::new("v2");
        store_value(&store, "summary", &policy, json!({"enrolled": 3})).expect("store");
        assert_eq!(
            cached_value(&store, "summary", &policy, false),
            Some(json!({"enrolled": 3}))
        );
        // Last writer wins on the same key.
        store_value(&store, "summary", &policy, json!({"enrolled": 4})).expect("store");
        assert_eq!(
            cached_value(&store, "summary", &policy, false),
            Some(json!({"enrolled": 4}))
        );
        store.clear().expect("clear");
        assert_eq!(store.get("summary"), None);
    }

    #[test]
    fn corrupt_blob_reads_as_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("dashboard-cache.json");
        fs::write(&path, "not json").expect("write corrupt blob");
        let store = FileCacheStore::new(&path);
        assert_eq!(store.get("summary"), None);
    }
}
