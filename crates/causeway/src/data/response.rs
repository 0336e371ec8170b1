use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Decoded response payload.
///
/// Decoding soft-degrades: a payload that does not match the configured
/// decoding is delivered as `Raw` instead of failing the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Parsed JSON document.
    Json(serde_json::Value),
    /// XML text, handed over unparsed.
    Xml(String),
    /// Raw payload bytes.
    Raw(Bytes),
    /// Path a download was saved to.
    File(PathBuf),
}

/// Terminal payload of a successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub body: Body,
    /// Whether the payload was served from the cache instead of the
    /// network.
    pub from_cache: bool,
}

impl Response {
    pub(crate) fn network(body: Body) -> Self {
        Self {
            body,
            from_cache: false,
        }
    }

    pub(crate) fn cached(body: Body) -> Self {
        Self {
            body,
            from_cache: true,
        }
    }

    /// Deserialize the payload into `T`.
    ///
    /// The one place a decode failure surfaces as an error instead of
    /// soft-degrading: a typed read has no raw fallback to offer.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match &self.body {
            Body::Json(value) => serde_json::from_value(value.clone()).map_err(|e| Error::Decode {
                message: e.to_string(),
            }),
            Body::Raw(bytes) => serde_json::from_slice(bytes).map_err(|e| Error::Decode {
                message: e.to_string(),
            }),
            Body::Xml(_) => Err(Error::Decode {
                message: "body is XML text".to_owned(),
            }),
            Body::File(path) => Err(Error::Decode {
                message: format!("body is a downloaded file: {}", path.display()),
            }),
        }
    }

    /// Payload as text, when it has a textual form.
    pub fn text(&self) -> Option<String> {
        match &self.body {
            Body::Json(value) => Some(value.to_string()),
            Body::Xml(text) => Some(text.clone()),
            Body::Raw(bytes) => String::from_utf8(bytes.to_vec()).ok(),
            Body::File(_) => None,
        }
    }

    /// Raw payload bytes, when the body is raw.
    pub fn raw(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Saved file path, when the body is a download.
    pub fn file_path(&self) -> Option<&Path> {
        match &self.body {
            Body::File(path) => Some(path),
            _ => None,
        }
    }
}
