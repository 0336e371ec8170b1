//! Response payload storage for Causeway.
//!
//! The request layer never talks to a concrete store; everything goes
//! through the [`CacheStore`] trait. Two implementations ship here:
//!
//! - [`MemoryCache`] - a mutexed map, for tests and short-lived processes
//! - [`DiskCache`] - a sled tree holding postcard-encoded entries, for
//!   caches that must survive restarts
//!
//! Stores are keyed by opaque strings (the request layer derives them from
//! URL and parameters) and hold raw payload bytes stamped with a write
//! time. All operations are synchronous and cheap relative to network I/O.

mod disk;
mod entry;
mod error;
mod store;

pub use disk::DiskCache;
pub use entry::CacheEntry;
pub use error::CacheError;
pub use store::{CacheStore, MemoryCache};
