//! URL resolution and wire-request construction.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::data::{Config, Method, Params, RequestEncoding, RequestOptions};
use crate::error::Error;

/// Fully-built request descriptor handed to the transport.
///
/// By the time one of these exists every decision is made: the URL is
/// absolute with GET parameters appended, headers are merged, and the body
/// is encoded. The transport only executes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub method: Method,
    /// Final wire URL.
    pub url: Url,
    /// Merged headers; common headers first, per-request overrides
    /// applied on top.
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Whole-exchange timeout the transport must enforce.
    pub timeout: Duration,
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON object built from the parameters.
    Json(serde_json::Value),
    /// Form-urlencoded pairs.
    Form(String),
}

/// Percent-encode the bytes of `raw` that cannot appear verbatim in a URL.
///
/// Conservative on purpose: unreserved characters, URL structure
/// characters, and `%` itself pass through untouched, so an
/// already-encoded URL is not encoded twice.
pub fn encode_url(raw: &str) -> String {
    const KEEP: &[u8] = b"-._~:/?#[]@!$&'()*+,;=%";
    let mut out = String::with_capacity(raw.len());
    for &byte in raw.as_bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Resolve a caller-supplied path or absolute URL against the config.
///
/// Absolute URLs pass through; relative paths are prefixed with the
/// configured base URL. A relative path with no base URL configured is a
/// submission error.
pub fn resolve_url(config: &Config, path_or_url: &str) -> Result<Url, Error> {
    let raw: Cow<'_, str> = if config.auto_encode_url {
        Cow::Owned(encode_url(path_or_url))
    } else {
        Cow::Borrowed(path_or_url)
    };

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(Url::parse(&raw)?);
    }

    match &config.base_url {
        Some(base) => {
            let joined = format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                raw.trim_start_matches('/')
            );
            Ok(Url::parse(&joined)?)
        }
        None => Err(Error::MissingBaseUrl {
            path: path_or_url.to_owned(),
        }),
    }
}

/// Merge common headers with per-request headers; per-request wins.
///
/// Map iteration order is not stable, so the common set is sorted by name
/// before the overrides land. Header names compare case-insensitively.
pub fn merge_headers(
    common: &HashMap<String, String>,
    specific: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = common
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    merged.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, value) in specific {
        match merged
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.clone(),
            None => merged.push((name.clone(), value.clone())),
        }
    }
    merged
}

/// Build the wire request for a GET or POST submission.
///
/// GET parameters are appended to the query string in caller order; POST
/// parameters become the body under the effective request encoding.
pub fn build_request(
    config: &Config,
    method: Method,
    endpoint: &Url,
    options: &RequestOptions,
) -> ResolvedRequest {
    let mut url = endpoint.clone();
    let mut body = None;

    match method {
        Method::Get => {
            if !options.params.is_empty() {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in options.params.iter() {
                    pairs.append_pair(key, &value.render());
                }
            }
        }
        Method::Post => {
            if !options.params.is_empty() {
                let encoding = options.request_encoding.unwrap_or(config.request_encoding);
                body = Some(encode_body(encoding, &options.params));
            }
        }
    }

    ResolvedRequest {
        method,
        url,
        headers: merge_headers(&config.common_headers, &options.headers),
        body,
        timeout: config.timeout,
    }
}

/// Build a body-less wire request, for uploads and downloads.
///
/// The multipart form or destination path travels separately; this only
/// fixes URL, headers, and timeout.
pub fn build_plain(
    config: &Config,
    method: Method,
    endpoint: &Url,
    headers: &[(String, String)],
) -> ResolvedRequest {
    ResolvedRequest {
        method,
        url: endpoint.clone(),
        headers: merge_headers(&config.common_headers, headers),
        body: None,
        timeout: config.timeout,
    }
}

fn encode_body(encoding: RequestEncoding, params: &Params) -> RequestBody {
    match encoding {
        RequestEncoding::Json => {
            let object: serde_json::Map<String, serde_json::Value> = params
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect();
            RequestBody::Json(serde_json::Value::Object(object))
        }
        RequestEncoding::PlainText => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in params.iter() {
                serializer.append_pair(key, &value.render());
            }
            RequestBody::Form(serializer.finish())
        }
    }
}
