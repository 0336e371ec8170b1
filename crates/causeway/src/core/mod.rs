//! Pure transformations: URL resolution, wire-request construction, cache
//! keys, and the network-vs-cache route decision.
//!
//! Nothing here performs I/O. Every function is total over a configuration
//! snapshot, which keeps the decision logic unit-testable without a
//! network or a runtime.

mod policy;
mod resolve;

pub use policy::{cache_key, cache_route, is_cacheable, CacheRoute, RouteQuery};
pub use resolve::{
    build_plain, build_request, encode_url, merge_headers, resolve_url, RequestBody,
    ResolvedRequest,
};
