//! Cache policy: key derivation and the network-vs-cache route decision.

use sha2::{Digest, Sha256};
use url::Url;

use crate::data::{Config, Method, Params, Reachability};

/// How one request interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRoute {
    /// Hit the network; the cache is never touched.
    Network,
    /// Serve the cached payload; the transport is never invoked.
    CacheOnly,
    /// Hit the network and write the payload through on success.
    NetworkThenCache {
        /// Replace an existing entry, or write only while the key is still
        /// absent so duplicate in-flight fetches produce one write.
        overwrite: bool,
    },
    /// Hit the network; serve the cached payload only if the transport
    /// fails.
    CacheOnFailure,
}

/// Inputs to the route decision, captured once at submission time.
///
/// Reachability is sampled exactly once per request; a flap between
/// submission and dispatch does not change the decision.
#[derive(Debug, Clone, Copy)]
pub struct RouteQuery {
    pub cacheable: bool,
    pub refresh: bool,
    pub entry_exists: bool,
    pub reachability: Reachability,
    pub offline_fallback: bool,
}

/// Whether this method participates in caching at all under `config`.
pub fn is_cacheable(method: Method, config: &Config) -> bool {
    match method {
        Method::Get => config.cache_get,
        Method::Post => config.cache_post,
    }
}

/// Decide the cache route for one request.
///
/// Order matters. The offline degrade wins even over an explicit refresh,
/// since a refresh against a dead network can only fail; refresh wins over
/// the cache-first read; an existing entry short-circuits the network;
/// everything else fetches and writes through.
pub fn cache_route(query: &RouteQuery) -> CacheRoute {
    if !query.cacheable {
        return CacheRoute::Network;
    }
    if !query.reachability.is_connected() && query.offline_fallback && query.entry_exists {
        return CacheRoute::CacheOnly;
    }
    if query.refresh {
        if query.offline_fallback && query.entry_exists {
            return CacheRoute::CacheOnFailure;
        }
        return CacheRoute::NetworkThenCache { overwrite: true };
    }
    if query.entry_exists {
        return CacheRoute::CacheOnly;
    }
    CacheRoute::NetworkThenCache { overwrite: false }
}

/// Derive the cache key for an endpoint and parameter set.
///
/// The key hashes the resolved absolute URL plus the parameters sorted by
/// key then value. Two requests that differ only in parameter insertion
/// order share a key; any differing name or value separates them.
pub fn cache_key(endpoint: &Url, params: &Params) -> String {
    let mut sorted: Vec<(String, String)> = params
        .iter()
        .map(|(key, value)| (key.clone(), value.render()))
        .collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_str().as_bytes());
    for (key, value) in &sorted {
        // field separator: ("ab", "c") must not collide with ("a", "bc")
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(cacheable: bool, refresh: bool, entry: bool) -> RouteQuery {
        RouteQuery {
            cacheable,
            refresh,
            entry_exists: entry,
            reachability: Reachability::Wifi,
            offline_fallback: false,
        }
    }

    #[test]
    fn uncacheable_requests_never_touch_the_cache() {
        for refresh in [false, true] {
            for entry in [false, true] {
                assert_eq!(
                    cache_route(&query(false, refresh, entry)),
                    CacheRoute::Network
                );
            }
        }
    }

    #[test]
    fn cache_first_serves_existing_entries() {
        assert_eq!(cache_route(&query(true, false, true)), CacheRoute::CacheOnly);
    }

    #[test]
    fn miss_fetches_and_writes_once() {
        assert_eq!(
            cache_route(&query(true, false, false)),
            CacheRoute::NetworkThenCache { overwrite: false }
        );
    }

    #[test]
    fn refresh_overwrites() {
        for entry in [false, true] {
            assert_eq!(
                cache_route(&query(true, true, entry)),
                CacheRoute::NetworkThenCache { overwrite: true }
            );
        }
    }

    #[test]
    fn refresh_with_fallback_keeps_the_entry_as_a_net() {
        let q = RouteQuery {
            offline_fallback: true,
            ..query(true, true, true)
        };
        assert_eq!(cache_route(&q), CacheRoute::CacheOnFailure);
    }

    #[test]
    fn unreachable_with_fallback_serves_the_cache_even_on_refresh() {
        for refresh in [false, true] {
            let q = RouteQuery {
                reachability: Reachability::Unreachable,
                offline_fallback: true,
                ..query(true, refresh, true)
            };
            assert_eq!(cache_route(&q), CacheRoute::CacheOnly);
        }
    }

    #[test]
    fn unreachable_without_fallback_changes_nothing() {
        let q = RouteQuery {
            reachability: Reachability::Unreachable,
            ..query(true, false, false)
        };
        assert_eq!(
            cache_route(&q),
            CacheRoute::NetworkThenCache { overwrite: false }
        );
    }

    #[test]
    fn unreachable_with_fallback_but_no_entry_goes_to_network() {
        let q = RouteQuery {
            reachability: Reachability::Unreachable,
            offline_fallback: true,
            ..query(true, false, false)
        };
        assert_eq!(
            cache_route(&q),
            CacheRoute::NetworkThenCache { overwrite: false }
        );
    }

    #[test]
    fn key_ignores_parameter_insertion_order() {
        let url = Url::parse("http://api.example.com/list").unwrap();
        let a = Params::new().insert("page", 1).insert("size", 20);
        let b = Params::new().insert("size", 20).insert("page", 1);
        assert_eq!(cache_key(&url, &a), cache_key(&url, &b));
    }

    #[test]
    fn key_separates_different_parameters() {
        let url = Url::parse("http://api.example.com/list").unwrap();
        let a = Params::new().insert("page", 1);
        let b = Params::new().insert("page", 2);
        let c = Params::new().insert("pag", "e1");
        assert_ne!(cache_key(&url, &a), cache_key(&url, &b));
        assert_ne!(cache_key(&url, &a), cache_key(&url, &c));
    }

    #[test]
    fn key_separates_different_endpoints() {
        let a = Url::parse("http://api.example.com/list").unwrap();
        let b = Url::parse("http://api.example.com/item").unwrap();
        let params = Params::new();
        assert_ne!(cache_key(&a, &params), cache_key(&b, &params));
    }

    #[test]
    fn key_is_hex_sha256() {
        let url = Url::parse("http://api.example.com/list").unwrap();
        let key = cache_key(&url, &Params::new());
        assert_eq!(key.len(), 64);
        assert!(key.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn post_cacheability_follows_its_flag() {
        let config = Config::default();
        assert!(is_cacheable(Method::Get, &config));
        assert!(!is_cacheable(Method::Post, &config));

        let config = config.with_cache(false, true);
        assert!(!is_cacheable(Method::Get, &config));
        assert!(is_cacheable(Method::Post, &config));
    }
}
