use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Body encoding applied to outgoing POST parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestEncoding {
    /// Parameters serialized as a JSON object body.
    #[default]
    Json,
    /// Parameters serialized form-urlencoded.
    PlainText,
}

/// Expected shape of response payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseEncoding {
    /// Parse the body as JSON. Payloads that are not valid JSON are
    /// delivered raw instead of failing the request.
    #[default]
    Json,
    /// Deliver the body as XML text for the caller's parser.
    Xml,
    /// Deliver the body untouched.
    Raw,
}

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client-wide request configuration.
///
/// One `Config` lives inside the client behind a read-mostly lock. Every
/// submitted request captures an immutable snapshot, so a setter call
/// midway through a request changes nothing for it.
///
/// Defaults match the common deployment profile: 60 s timeout, GET
/// caching on, POST caching off, offline fallback off, cancelled tasks
/// still notified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix for relative request paths. Submitting a relative path with
    /// no base URL configured fails the request.
    pub base_url: Option<Url>,
    /// Whole-exchange timeout handed to the transport.
    pub timeout: Duration,
    /// Percent-encode caller-supplied paths and URLs before parsing.
    pub auto_encode_url: bool,
    /// Deliver a cancellation error through the handle when a task is
    /// cancelled. When off, the outcome of a cancelled task is suppressed
    /// entirely.
    pub callback_on_cancel: bool,
    /// Headers merged into every request; per-request headers win on
    /// conflict. Expected to be set once during startup.
    pub common_headers: HashMap<String, String>,
    /// Cache successful GET payloads.
    pub cache_get: bool,
    /// Cache successful POST payloads.
    pub cache_post: bool,
    /// Serve cached payloads when the network is unreachable, and fall
    /// back to them when a forced refresh fails.
    pub offline_fallback: bool,
    /// Emit per-request lifecycle logs at debug level.
    pub debug: bool,
    /// Default body encoding for POST parameters.
    pub request_encoding: RequestEncoding,
    /// Default response decoding.
    pub response_encoding: ResponseEncoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            auto_encode_url: false,
            callback_on_cancel: true,
            common_headers: HashMap::new(),
            cache_get: true,
            cache_post: false,
            offline_fallback: false,
            debug: false,
            request_encoding: RequestEncoding::Json,
            response_encoding: ResponseEncoding::Json,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, base: Url) -> Self {
        self.base_url = Some(base);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_auto_encode_url(mut self, enabled: bool) -> Self {
        self.auto_encode_url = enabled;
        self
    }

    #[must_use]
    pub fn with_callback_on_cancel(mut self, enabled: bool) -> Self {
        self.callback_on_cancel = enabled;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.common_headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_cache(mut self, get: bool, post: bool) -> Self {
        self.cache_get = get;
        self.cache_post = post;
        self
    }

    #[must_use]
    pub fn with_offline_fallback(mut self, enabled: bool) -> Self {
        self.offline_fallback = enabled;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    #[must_use]
    pub fn with_encodings(mut self, request: RequestEncoding, response: ResponseEncoding) -> Self {
        self.request_encoding = request;
        self.response_encoding = response;
        self
    }
}
