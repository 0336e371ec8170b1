use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cached response payload.
///
/// Entries are opaque to the request layer: it checks for presence and
/// reads the payload bytes, nothing else. The timestamp records when the
/// payload was written and is kept for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key the entry is stored under.
    pub key: String,
    /// Response bytes exactly as received from the network.
    pub payload: Vec<u8>,
    /// When the payload was written.
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry stamped with the current time.
    pub fn new(key: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            stored_at: Utc::now(),
        }
    }

    /// Age of the entry relative to now.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.stored_at
    }
}
