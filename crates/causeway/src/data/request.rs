use std::fmt;
use std::path::PathBuf;

use crate::data::config::{RequestEncoding, ResponseEncoding};
use crate::data::progress::ProgressFn;

/// Verbs the unified request path carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// One request parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    /// Canonical wire rendering, shared by query strings, form bodies, and
    /// cache keys.
    pub fn render(&self) -> String {
        match self {
            ParamValue::Text(s) => s.clone(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Float(x) => x.to_string(),
            ParamValue::Bool(b) => b.to_string(),
        }
    }

    /// JSON representation for JSON-encoded bodies.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Text(s) => serde_json::Value::String(s.clone()),
            ParamValue::Int(n) => serde_json::Value::from(*n),
            ParamValue::Float(x) => serde_json::Value::from(*x),
            ParamValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i32> for ParamValue {
    fn from(n: i32) -> Self {
        ParamValue::Int(n.into())
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(x)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Ordered request parameters.
///
/// Insertion order is preserved on the wire. Cache keys sort a copy, so
/// the same logical parameter set always maps to the same key no matter
/// how the caller assembled it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, keeping insertion order.
    #[must_use]
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParamValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Options for GET and POST submissions.
///
/// Everything is optional; `RequestOptions::new()` submits a bare request
/// under the client's configured defaults.
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Request parameters; query string for GET, body for POST.
    pub params: Params,
    /// Bypass the cached entry and hit the network, overwriting the cache
    /// on success.
    pub refresh_cache: bool,
    /// Per-request headers, applied over the client's common headers.
    pub headers: Vec<(String, String)>,
    /// Override of the client's request body encoding.
    pub request_encoding: Option<RequestEncoding>,
    /// Override of the client's response decoding.
    pub response_encoding: Option<ResponseEncoding>,
    /// Progress sink for the response body.
    pub on_progress: Option<ProgressFn>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params = self.params.insert(key, value);
        self
    }

    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn refresh_cache(mut self, refresh: bool) -> Self {
        self.refresh_cache = refresh;
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn request_encoding(mut self, encoding: RequestEncoding) -> Self {
        self.request_encoding = Some(encoding);
        self
    }

    #[must_use]
    pub fn response_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.response_encoding = Some(encoding);
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("params", &self.params)
            .field("refresh_cache", &self.refresh_cache)
            .field("headers", &self.headers)
            .field("request_encoding", &self.request_encoding)
            .field("response_encoding", &self.response_encoding)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Where a multipart file part's content comes from.
#[derive(Debug, Clone)]
pub enum PartSource {
    /// In-memory bytes, e.g. an encoded image.
    Bytes(Vec<u8>),
    /// A file read from disk at upload time.
    File(PathBuf),
}

/// One file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name the server expects.
    pub field: String,
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type reported to the server.
    pub mime: String,
    pub source: PartSource,
}

impl FilePart {
    /// A part from in-memory bytes.
    ///
    /// Defaults suit the common image-upload case: the file name is a
    /// `yyyymmddhhmmss.jpg` timestamp and the MIME type is `image/jpeg`.
    /// Override both with [`file_name`](Self::file_name) and
    /// [`mime`](Self::mime).
    pub fn bytes(field: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: format!("{}.jpg", chrono::Utc::now().format("%Y%m%d%H%M%S")),
            mime: "image/jpeg".to_owned(),
            source: PartSource::Bytes(content),
        }
    }

    /// A part read from a file on disk.
    ///
    /// The file name defaults to the path's last component and the MIME
    /// type to `application/octet-stream`.
    pub fn file(field: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}", chrono::Utc::now().format("%Y%m%d%H%M%S")));
        Self {
            field: field.into(),
            file_name,
            mime: "application/octet-stream".to_owned(),
            source: PartSource::File(path),
        }
    }

    #[must_use]
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    #[must_use]
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }
}

/// Options for multipart uploads.
///
/// Uploads never read or write the cache, so there is no refresh flag.
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// Scalar form fields sent alongside the file parts.
    pub params: Params,
    /// File parts, in submission order.
    pub parts: Vec<FilePart>,
    /// Per-request headers, applied over the client's common headers.
    pub headers: Vec<(String, String)>,
    /// Override of the client's response decoding.
    pub response_encoding: Option<ResponseEncoding>,
    /// Progress sink for bytes written to the wire.
    pub on_progress: Option<ProgressFn>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn part(mut self, part: FilePart) -> Self {
        self.parts.push(part);
        self
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params = self.params.insert(key, value);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn response_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.response_encoding = Some(encoding);
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("params", &self.params)
            .field("parts", &self.parts)
            .field("headers", &self.headers)
            .field("response_encoding", &self.response_encoding)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Options for downloads.
#[derive(Clone, Default)]
pub struct DownloadOptions {
    /// Per-request headers, applied over the client's common headers.
    pub headers: Vec<(String, String)>,
    /// Progress sink for bytes read from the wire.
    pub on_progress: Option<ProgressFn>,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("headers", &self.headers)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "..."))
            .finish()
    }
}
