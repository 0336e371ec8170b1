use std::path::Path;

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::store::CacheStore;

/// Disk-backed store: a sled database holding postcard-encoded entries.
///
/// sled supplies the concurrent key-value mechanics, including the
/// compare-and-swap that backs `put_if_absent`; this type only shapes
/// entries in and out of it.
pub struct DiskCache {
    db: sled::Db,
}

impl DiskCache {
    /// Open (or create) the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn encode(entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
        Ok(postcard::to_allocvec(entry)?)
    }

    fn decode(raw: &[u8]) -> Result<CacheEntry, CacheError> {
        Ok(postcard::from_bytes(raw)?)
    }
}

impl CacheStore for DiskCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        match self.db.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
        let raw = Self::encode(&CacheEntry::new(key, payload))?;
        self.db.insert(key.as_bytes(), raw)?;
        Ok(())
    }

    fn put_if_absent(&self, key: &str, payload: &[u8]) -> Result<bool, CacheError> {
        let raw = Self::encode(&CacheEntry::new(key, payload))?;
        let swap = self
            .db
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(raw))?;
        Ok(swap.is_ok())
    }

    fn total_size(&self) -> Result<u64, CacheError> {
        Ok(self.db.size_on_disk()?)
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.db.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, DiskCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn roundtrips_entries() {
        let (_dir, cache) = open_temp();
        cache.put("k", b"payload").unwrap();

        let entry = cache.get("k").unwrap().unwrap();
        assert_eq!(entry.key, "k");
        assert_eq!(entry.payload, b"payload");
        assert!(cache.get("other").unwrap().is_none());
    }

    #[test]
    fn put_if_absent_keeps_first_write() {
        let (_dir, cache) = open_temp();
        assert!(cache.put_if_absent("k", b"first").unwrap());
        assert!(!cache.put_if_absent("k", b"second").unwrap());

        assert_eq!(cache.get("k").unwrap().unwrap().payload, b"first");
    }

    #[test]
    fn put_overwrites() {
        let (_dir, cache) = open_temp();
        cache.put("k", b"first").unwrap();
        cache.put("k", b"second").unwrap();

        assert_eq!(cache.get("k").unwrap().unwrap().payload, b"second");
    }

    #[test]
    fn clear_empties_the_tree() {
        let (_dir, cache) = open_temp();
        cache.put("a", b"one").unwrap();
        cache.put("b", b"two").unwrap();

        cache.clear().unwrap();
        assert!(cache.get("a").unwrap().is_none());
        assert!(cache.get("b").unwrap().is_none());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache");
        {
            let cache = DiskCache::open(&path).unwrap();
            cache.put("k", b"persisted").unwrap();
        }
        let cache = DiskCache::open(&path).unwrap();
        assert_eq!(cache.get("k").unwrap().unwrap().payload, b"persisted");
    }
}
