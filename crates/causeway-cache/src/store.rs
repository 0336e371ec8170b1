use std::collections::HashMap;
use std::sync::Mutex;

use crate::entry::CacheEntry;
use crate::error::CacheError;

/// Keyed store for response payloads.
///
/// Implementations must tolerate concurrent calls from many requests.
/// `total_size` accounting is implementation-defined: stored payload bytes
/// for in-memory stores, on-disk footprint for persistent ones.
pub trait CacheStore: Send + Sync {
    /// Look up the entry stored under `key`.
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `payload` under `key`, replacing any existing entry.
    fn put(&self, key: &str, payload: &[u8]) -> Result<(), CacheError>;

    /// Store `payload` under `key` only when no entry exists yet.
    ///
    /// Returns `true` when the write happened. Duplicate in-flight fetches
    /// of one key race through here and exactly one wins.
    fn put_if_absent(&self, key: &str, payload: &[u8]) -> Result<bool, CacheError>;

    /// Size of the stored data in bytes.
    fn total_size(&self) -> Result<u64, CacheError>;

    /// Drop every entry.
    fn clear(&self) -> Result<(), CacheError>;
}

/// In-memory store backed by a mutexed map.
///
/// Enough for request de-duplication and offline fallback inside one
/// process; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.lock().get(key).cloned())
    }

    fn put(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
        self.lock()
            .insert(key.to_owned(), CacheEntry::new(key, payload));
        Ok(())
    }

    fn put_if_absent(&self, key: &str, payload: &[u8]) -> Result<bool, CacheError> {
        let mut entries = self.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_owned(), CacheEntry::new(key, payload));
        Ok(true)
    }

    fn total_size(&self) -> Result<u64, CacheError> {
        Ok(self.lock().values().map(|e| e.payload.len() as u64).sum())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.lock().clear();
        Ok(())
    }
}
