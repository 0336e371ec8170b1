//! Client-side HTTP access layer: one façade for GET, POST, upload, and
//! download with response caching, offline fallback, and URL-keyed
//! cancellation.
//!
//! # Architecture
//!
//! The crate follows a three-layer pattern:
//! - `data` - immutable configuration and request/response types
//! - `core` - pure transformations: URL resolution, cache keys, and the
//!   network-vs-cache route decision
//! - `effects` - I/O behind traits: transport, cache store, task
//!   registry, reachability, and the client that composes them
//!
//! # Key behaviors
//!
//! - **Cache-first reads**: a cacheable request with a stored entry is
//!   served locally unless the caller forces a refresh.
//! - **Offline fallback**: when opted in, an unreachable network degrades
//!   to cached payloads instead of failing outright.
//! - **URL-keyed cancellation**: every task is tracked under its resolved
//!   URL; cancel one handle, one URL, or everything.
//! - **Soft decode degrade**: payloads that fail the configured decoding
//!   are delivered raw, never dropped, and never poison the cache.
//!
//! ```no_run
//! use causeway::{Client, RequestOptions};
//!
//! # async fn demo() -> Result<(), causeway::Error> {
//! let client = Client::new()?;
//! client.set_base_url("http://api.example.com")?;
//!
//! let task = client.get("/articles", RequestOptions::new().param("page", 1));
//! if let Some(result) = task.join().await {
//!     let response = result?;
//!     println!("from cache: {}", response.from_cache);
//! }
//! # Ok(())
//! # }
//! ```

mod core;
mod data;
mod effects;
mod error;

pub use causeway_cache::{CacheEntry, CacheError, CacheStore, DiskCache, MemoryCache};

pub use self::core::{RequestBody, ResolvedRequest};
pub use data::{
    Body, Config, DownloadOptions, FilePart, Method, ParamValue, Params, PartSource, Progress,
    ProgressFn, Reachability, RequestEncoding, RequestOptions, Response, ResponseEncoding,
    UploadOptions, DEFAULT_TIMEOUT,
};
pub use effects::{
    Client, MultipartForm, Outcome, ReachabilityMonitor, Registry, TaskHandle, TaskId, Transport,
};
pub use error::{Error, Result, TransportError};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestTransport;
