//! Transport executor boundary.

use std::future::Future;
use std::path::Path;

use bytes::Bytes;

use crate::core::ResolvedRequest;
use crate::data::{FilePart, Params, ProgressFn};
use crate::error::TransportError;

/// Multipart payload for uploads: file parts plus scalar form fields.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    pub parts: Vec<FilePart>,
    pub fields: Vec<(String, String)>,
}

impl MultipartForm {
    pub fn new(parts: Vec<FilePart>, params: &Params) -> Self {
        Self {
            parts,
            fields: params
                .iter()
                .map(|(key, value)| (key.clone(), value.render()))
                .collect(),
        }
    }
}

/// Executes fully-built requests over the wire.
///
/// The request layer owns every decision about a request; the transport
/// owns the mechanics: connection handling, timeout enforcement, progress
/// cadence, and staging of downloaded files. Cancellation is cooperative,
/// so dropping a returned future must abort the exchange and stop
/// progress delivery.
pub trait Transport: Send + Sync + 'static {
    /// Execute a GET or POST exchange and return the success payload.
    ///
    /// Non-success statuses are reported as [`TransportError::Status`].
    /// Progress reports response body bytes as they stream in.
    fn send(
        &self,
        request: &ResolvedRequest,
        progress: Option<ProgressFn>,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    /// Stream the response body to `dest`, reporting bytes read.
    ///
    /// Returns the number of bytes written. What happens to partially
    /// written data on failure is the implementation's concern.
    fn download(
        &self,
        request: &ResolvedRequest,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> impl Future<Output = Result<u64, TransportError>> + Send;

    /// Submit a multipart form, reporting request bytes as they go out,
    /// and return the success payload.
    fn upload(
        &self,
        request: &ResolvedRequest,
        form: MultipartForm,
        progress: Option<ProgressFn>,
    ) -> impl Future<Output = Result<Bytes, TransportError>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use bytes::{Bytes, BytesMut};
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    use super::{MultipartForm, Transport};
    use crate::core::{RequestBody, ResolvedRequest};
    use crate::data::{Method, PartSource, Progress, ProgressFn};
    use crate::error::TransportError;

    /// Production transport backed by `reqwest`.
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Build a transport with the default client configuration.
        ///
        /// Timeouts are applied per request from the resolved descriptor,
        /// not on the client, so configuration changes take effect without
        /// rebuilding the connection pool.
        pub fn new() -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .build()
                .map_err(|e| TransportError::Network(e.to_string()))?;
            Ok(Self { client })
        }

        fn builder(&self, request: &ResolvedRequest) -> reqwest::RequestBuilder {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
            };
            let mut builder = self.client.request(method, request.url.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            match &request.body {
                Some(RequestBody::Json(value)) => builder = builder.json(value),
                Some(RequestBody::Form(encoded)) => {
                    builder = builder
                        .header(
                            reqwest::header::CONTENT_TYPE,
                            "application/x-www-form-urlencoded",
                        )
                        .body(encoded.clone());
                }
                None => {}
            }
            builder
        }
    }

    impl From<reqwest::Error> for TransportError {
        fn from(e: reqwest::Error) -> Self {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        }
    }

    async fn read_success(
        response: reqwest::Response,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buf.extend_from_slice(&chunk);
            if let Some(report) = &progress {
                report(&Progress::new(buf.len() as u64, total));
            }
        }
        Ok(buf.freeze())
    }

    impl Transport for ReqwestTransport {
        async fn send(
            &self,
            request: &ResolvedRequest,
            progress: Option<ProgressFn>,
        ) -> Result<Bytes, TransportError> {
            let response = self.builder(request).timeout(request.timeout).send().await?;
            read_success(response, progress).await
        }

        async fn download(
            &self,
            request: &ResolvedRequest,
            dest: &Path,
            progress: Option<ProgressFn>,
        ) -> Result<u64, TransportError> {
            // The timeout bounds the header wait only; streaming a large
            // body must not race a wall-clock cap.
            let response = tokio::time::timeout(request.timeout, self.builder(request).send())
                .await
                .map_err(|_| TransportError::Timeout)??;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let total = response.content_length();
            let staging = staging_path(dest);
            let mut file = tokio::fs::File::create(&staging).await?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
                if let Some(report) = &progress {
                    report(&Progress::new(written, total));
                }
            }
            file.flush().await?;
            drop(file);

            // Complete files only ever appear at `dest`; failures leave the
            // staging fragment behind for inspection.
            tokio::fs::rename(&staging, dest).await?;
            Ok(written)
        }

        async fn upload(
            &self,
            request: &ResolvedRequest,
            form: MultipartForm,
            progress: Option<ProgressFn>,
        ) -> Result<Bytes, TransportError> {
            let mut contents = Vec::with_capacity(form.parts.len());
            for part in &form.parts {
                let bytes = match &part.source {
                    PartSource::Bytes(bytes) => bytes.clone(),
                    PartSource::File(path) => tokio::fs::read(path).await?,
                };
                contents.push(bytes);
            }
            // Progress totals cover part content; multipart framing is not
            // worth predicting.
            let total: u64 = contents.iter().map(|c| c.len() as u64).sum();
            let sent = Arc::new(AtomicU64::new(0));

            let mut multipart = reqwest::multipart::Form::new();
            for (name, value) in &form.fields {
                multipart = multipart.text(name.clone(), value.clone());
            }
            for (part, content) in form.parts.iter().zip(contents) {
                let length = content.len() as u64;
                let stream =
                    counting_stream(content, Arc::clone(&sent), progress.clone(), total);
                let body = reqwest::Body::wrap_stream(stream);
                let piece = reqwest::multipart::Part::stream_with_length(body, length)
                    .file_name(part.file_name.clone())
                    .mime_str(&part.mime)
                    .map_err(|e| TransportError::Network(e.to_string()))?;
                multipart = multipart.part(part.field.clone(), piece);
            }

            let response = self
                .builder(request)
                .timeout(request.timeout)
                .multipart(multipart)
                .send()
                .await?;
            read_success(response, None).await
        }
    }

    /// Chunk part content so the shared counter advances as reqwest pulls
    /// bytes onto the wire.
    fn counting_stream(
        content: Vec<u8>,
        sent: Arc<AtomicU64>,
        progress: Option<ProgressFn>,
        total: u64,
    ) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send {
        const CHUNK: usize = 16 * 1024;
        let chunks: Vec<Bytes> = content.chunks(CHUNK).map(Bytes::copy_from_slice).collect();
        futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
            let so_far = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
            if let Some(report) = &progress {
                report(&Progress::new(so_far, Some(total)));
            }
            Ok(chunk)
        }))
    }

    /// `<dest>.part`, kept in the destination directory so the final
    /// rename stays on one filesystem.
    fn staging_path(dest: &Path) -> PathBuf {
        let mut name = dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download".into());
        name.push(".part");
        dest.with_file_name(name)
    }

}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestTransport;
