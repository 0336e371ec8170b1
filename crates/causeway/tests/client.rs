//! End-to-end client behavior over scripted transports.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

use causeway::{
    Body, CacheEntry, CacheError, CacheStore, Client, DownloadOptions, Error, FilePart,
    MemoryCache, Method, MultipartForm, PartSource, Progress, ProgressFn, Reachability,
    RequestOptions, ResolvedRequest, Response, ResponseEncoding, TaskHandle, Transport,
    TransportError, UploadOptions,
};

#[derive(Clone)]
enum Script {
    Reply(Vec<u8>),
    Fail,
    Hang,
}

struct ScriptState {
    script: Mutex<Script>,
    sends: AtomicUsize,
    seen: Mutex<Vec<ResolvedRequest>>,
}

/// Transport that plays a script instead of touching the network.
#[derive(Clone)]
struct ScriptedTransport {
    state: Arc<ScriptState>,
}

impl ScriptedTransport {
    fn with_script(script: Script) -> Self {
        Self {
            state: Arc::new(ScriptState {
                script: Mutex::new(script),
                sends: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }),
        }
    }

    fn replying(payload: &[u8]) -> Self {
        Self::with_script(Script::Reply(payload.to_vec()))
    }

    fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    fn hanging() -> Self {
        Self::with_script(Script::Hang)
    }

    fn set_script(&self, script: Script) {
        *self.state.script.lock().unwrap() = script;
    }

    fn sends(&self) -> usize {
        self.state.sends.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> ResolvedRequest {
        self.state.seen.lock().unwrap().last().cloned().unwrap()
    }

    async fn play(&self, request: &ResolvedRequest) -> Result<Bytes, TransportError> {
        self.state.sends.fetch_add(1, Ordering::SeqCst);
        self.state.seen.lock().unwrap().push(request.clone());
        let script = self.state.script.lock().unwrap().clone();
        match script {
            Script::Reply(payload) => Ok(Bytes::from(payload)),
            Script::Fail => Err(TransportError::Network("scripted failure".to_owned())),
            Script::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &ResolvedRequest,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, TransportError> {
        let payload = self.play(request).await?;
        if let Some(report) = &progress {
            report(&Progress::new(
                payload.len() as u64,
                Some(payload.len() as u64),
            ));
        }
        Ok(payload)
    }

    async fn download(
        &self,
        request: &ResolvedRequest,
        dest: &Path,
        progress: Option<ProgressFn>,
    ) -> Result<u64, TransportError> {
        let payload = self.play(request).await?;
        tokio::fs::write(dest, &payload).await?;
        if let Some(report) = &progress {
            report(&Progress::new(
                payload.len() as u64,
                Some(payload.len() as u64),
            ));
        }
        Ok(payload.len() as u64)
    }

    async fn upload(
        &self,
        request: &ResolvedRequest,
        form: MultipartForm,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, TransportError> {
        let total: u64 = form
            .parts
            .iter()
            .map(|part| match &part.source {
                PartSource::Bytes(bytes) => bytes.len() as u64,
                PartSource::File(_) => 0,
            })
            .sum();
        if let Some(report) = &progress {
            report(&Progress::new(total, Some(total)));
        }
        self.play(request).await
    }
}

/// Memory cache that counts reads and effective writes.
struct CountingCache {
    inner: MemoryCache,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingCache {
    fn new() -> Self {
        Self {
            inner: MemoryCache::new(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CacheStore for CountingCache {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn put(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, payload)
    }

    fn put_if_absent(&self, key: &str, payload: &[u8]) -> Result<bool, CacheError> {
        let wrote = self.inner.put_if_absent(key, payload)?;
        if wrote {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(wrote)
    }

    fn total_size(&self) -> Result<u64, CacheError> {
        self.inner.total_size()
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear()
    }
}

fn base_client(transport: ScriptedTransport) -> Client<ScriptedTransport> {
    let client = Client::with_parts(transport, Arc::new(MemoryCache::new()));
    client.set_base_url("http://api.test").unwrap();
    client
}

async fn join_ok(task: TaskHandle) -> Response {
    task.join().await.expect("outcome").expect("success")
}

fn progress_sink() -> (Arc<Mutex<Vec<Progress>>>, ProgressFn) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressFn = Arc::new(move |p: &Progress| sink.lock().unwrap().push(*p));
    (seen, callback)
}

#[tokio::test]
async fn second_get_is_served_from_cache() {
    let transport = ScriptedTransport::replying(br#"{"v":1}"#);
    let client = base_client(transport.clone());

    let first = join_ok(client.get("/list", RequestOptions::new())).await;
    assert!(!first.from_cache);

    let second = join_ok(client.get("/list", RequestOptions::new())).await;
    assert!(second.from_cache);
    assert_eq!(second.body, Body::Json(json!({"v": 1})));
    assert_eq!(transport.sends(), 1);
}

#[tokio::test]
async fn refresh_bypasses_and_overwrites_the_entry() {
    let transport = ScriptedTransport::replying(br#"{"v":1}"#);
    let client = base_client(transport.clone());
    join_ok(client.get("/list", RequestOptions::new())).await;

    transport.set_script(Script::Reply(br#"{"v":2}"#.to_vec()));
    let refreshed = join_ok(client.get("/list", RequestOptions::new().refresh_cache(true))).await;
    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.body, Body::Json(json!({"v": 2})));
    assert_eq!(transport.sends(), 2);

    let third = join_ok(client.get("/list", RequestOptions::new())).await;
    assert!(third.from_cache);
    assert_eq!(third.body, Body::Json(json!({"v": 2})));
    assert_eq!(transport.sends(), 2);
}

#[tokio::test]
async fn post_skips_the_cache_by_default() {
    let transport = ScriptedTransport::replying(br#"{"ok":true}"#);
    let cache = Arc::new(CountingCache::new());
    let client = Client::with_parts(transport.clone(), cache.clone());
    client.set_base_url("http://api.test").unwrap();

    join_ok(client.post("/submit", RequestOptions::new().param("a", 1))).await;
    join_ok(client.post("/submit", RequestOptions::new().param("a", 1))).await;
    // refresh changes nothing for an uncacheable method
    join_ok(client.post(
        "/submit",
        RequestOptions::new().param("a", 1).refresh_cache(true),
    ))
    .await;

    assert_eq!(transport.sends(), 3);
    assert_eq!(cache.reads(), 0);
    assert_eq!(cache.writes(), 0);
}

#[tokio::test]
async fn cached_post_key_ignores_parameter_order() {
    let transport = ScriptedTransport::replying(br#"{"ok":true}"#);
    let client = base_client(transport.clone());
    client.set_cache_enabled(true, true);

    join_ok(client.post(
        "/submit",
        RequestOptions::new().param("a", 1).param("b", 2),
    ))
    .await;
    let second = join_ok(client.post(
        "/submit",
        RequestOptions::new().param("b", 2).param("a", 1),
    ))
    .await;

    assert!(second.from_cache);
    assert_eq!(transport.sends(), 1);
}

#[tokio::test]
async fn unreachable_network_degrades_to_cache_even_on_refresh() {
    let transport = ScriptedTransport::replying(br#"{"v":1}"#);
    let client = base_client(transport.clone());
    join_ok(client.get("/list", RequestOptions::new())).await;

    client.set_offline_fallback(true);
    client.monitor().update(Reachability::Unreachable);
    assert_eq!(client.reachability(), Reachability::Unreachable);

    let offline = join_ok(client.get("/list", RequestOptions::new().refresh_cache(true))).await;
    assert!(offline.from_cache);
    assert_eq!(transport.sends(), 1);
}

#[tokio::test]
async fn unreachable_without_fallback_surfaces_the_transport_error() {
    let transport = ScriptedTransport::failing();
    let client = base_client(transport.clone());
    client.monitor().update(Reachability::Unreachable);

    let outcome = client.get("/list", RequestOptions::new()).join().await;
    assert!(matches!(
        outcome,
        Some(Err(Error::Transport(TransportError::Network(_))))
    ));
    assert_eq!(transport.sends(), 1);
}

#[tokio::test]
async fn failed_refresh_falls_back_to_the_stale_entry() {
    let transport = ScriptedTransport::replying(br#"{"v":1}"#);
    let client = base_client(transport.clone());
    join_ok(client.get("/list", RequestOptions::new())).await;

    client.set_offline_fallback(true);
    transport.set_script(Script::Fail);

    let fallback = join_ok(client.get("/list", RequestOptions::new().refresh_cache(true))).await;
    assert!(fallback.from_cache);
    assert_eq!(fallback.body, Body::Json(json!({"v": 1})));
    // the refresh attempt did go out before the degrade
    assert_eq!(transport.sends(), 2);
}

#[tokio::test]
async fn duplicate_concurrent_gets_write_the_key_once() {
    let transport = ScriptedTransport::replying(br#"{"v":1}"#);
    let cache = Arc::new(CountingCache::new());
    let client = Client::with_parts(transport.clone(), cache.clone());
    client.set_base_url("http://api.test").unwrap();

    let first = client.get("/list", RequestOptions::new());
    let second = client.get("/list", RequestOptions::new());
    let (a, b) = tokio::join!(first.join(), second.join());

    let a = a.expect("outcome").expect("success");
    let b = b.expect("outcome").expect("success");
    assert_eq!(a.body, b.body);
    assert_eq!(transport.sends(), 2);
    assert_eq!(cache.writes(), 1);
}

#[tokio::test]
async fn cancelled_task_reports_cancellation() {
    let transport = ScriptedTransport::hanging();
    let client = base_client(transport);

    let task = client.get("/slow", RequestOptions::new());
    assert_eq!(client.active_tasks(), 1);
    assert!(task.cancel());
    assert_eq!(client.active_tasks(), 0);

    let outcome = task.join().await;
    assert!(matches!(outcome, Some(Err(Error::Cancelled))));
}

#[tokio::test]
async fn suppressed_cancellation_delivers_nothing() {
    let transport = ScriptedTransport::hanging();
    let client = base_client(transport);
    client.set_callback_on_cancel(false);

    let task = client.get("/slow", RequestOptions::new());
    assert!(task.cancel());
    assert!(task.join().await.is_none());
}

#[tokio::test]
async fn cancel_by_url_matches_the_resolved_form() {
    let transport = ScriptedTransport::hanging();
    let client = base_client(transport);

    let a1 = client.get("/a", RequestOptions::new().param("page", 1));
    let a2 = client.get("/a", RequestOptions::new());
    let b = client.get("/b", RequestOptions::new());
    assert_eq!(a1.url().unwrap().as_str(), "http://api.test/a");

    // the absolute form cancels tasks submitted with the relative path,
    // parameters notwithstanding
    assert_eq!(client.cancel_by_url("http://api.test/a").unwrap(), 2);
    assert!(matches!(a1.join().await, Some(Err(Error::Cancelled))));
    assert!(matches!(a2.join().await, Some(Err(Error::Cancelled))));
    assert_eq!(client.active_tasks(), 1);

    assert_eq!(client.cancel_all(), 1);
    assert!(matches!(b.join().await, Some(Err(Error::Cancelled))));
}

#[tokio::test]
async fn relative_path_without_base_url_is_rejected() {
    let transport = ScriptedTransport::replying(b"{}");
    let client = Client::with_parts(transport.clone(), Arc::new(MemoryCache::new()));

    let task = client.get("/rel", RequestOptions::new());
    assert!(task.id().is_none());
    assert_eq!(client.active_tasks(), 0);

    let outcome = task.join().await;
    assert!(matches!(outcome, Some(Err(Error::MissingBaseUrl { .. }))));
    assert_eq!(transport.sends(), 0);
}

#[tokio::test]
async fn undecodable_payload_degrades_to_raw_and_skips_the_cache() {
    let transport = ScriptedTransport::replying(b"plain text, not json");
    let cache = Arc::new(CountingCache::new());
    let client = Client::with_parts(transport.clone(), cache.clone());
    client.set_base_url("http://api.test").unwrap();

    let degraded = join_ok(client.get("/body", RequestOptions::new())).await;
    assert_eq!(
        degraded.body,
        Body::Raw(Bytes::from_static(b"plain text, not json"))
    );
    assert_eq!(cache.writes(), 0);

    join_ok(client.get("/body", RequestOptions::new())).await;
    assert_eq!(transport.sends(), 2);
}

#[tokio::test]
async fn response_encoding_override_delivers_xml_text() {
    let transport = ScriptedTransport::replying(b"<root/>");
    let client = base_client(transport);

    let response = join_ok(client.get(
        "/feed",
        RequestOptions::new().response_encoding(ResponseEncoding::Xml),
    ))
    .await;
    assert_eq!(response.body, Body::Xml("<root/>".to_owned()));
}

#[tokio::test]
async fn upload_round_trips_and_never_touches_the_cache() {
    let transport = ScriptedTransport::replying(br#"{"stored":true}"#);
    let cache = Arc::new(CountingCache::new());
    let client = Client::with_parts(transport.clone(), cache.clone());
    client.set_base_url("http://api.test").unwrap();

    let (seen, callback) = progress_sink();
    let options = UploadOptions::new()
        .param("album", "trip")
        .part(FilePart::bytes("photo", vec![1, 2, 3, 4]).file_name("a.jpg"))
        .on_progress(callback);

    let response = join_ok(client.upload("/photos", options)).await;
    assert_eq!(response.body, Body::Json(json!({"stored": true})));
    assert!(!response.from_cache);
    assert_eq!(cache.reads() + cache.writes(), 0);
    assert!(!seen.lock().unwrap().is_empty());

    let request = transport.last_request();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url.as_str(), "http://api.test/photos");
}

#[tokio::test]
async fn download_places_the_file_at_the_destination() {
    let transport = ScriptedTransport::replying(b"file-bytes");
    let client = base_client(transport);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("artifact.bin");

    let (seen, callback) = progress_sink();
    let response = join_ok(client.download(
        "/artifact",
        &dest,
        DownloadOptions::new().on_progress(callback),
    ))
    .await;

    assert_eq!(response.file_path(), Some(dest.as_path()));
    assert_eq!(std::fs::read(&dest).unwrap(), b"file-bytes");
    assert!(!seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn uploads_and_downloads_cancel_through_the_registry() {
    let transport = ScriptedTransport::hanging();
    let client = base_client(transport);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("never.bin");

    let upload = client.upload(
        "/photos",
        UploadOptions::new().part(FilePart::bytes("photo", vec![1, 2, 3])),
    );
    let download = client.download("/artifact", &dest, DownloadOptions::new());
    assert_eq!(client.active_tasks(), 2);

    assert!(upload.cancel());
    assert_eq!(client.cancel_by_url("/artifact").unwrap(), 1);

    assert!(matches!(upload.join().await, Some(Err(Error::Cancelled))));
    assert!(matches!(download.join().await, Some(Err(Error::Cancelled))));
    assert!(!dest.exists());
    assert_eq!(client.active_tasks(), 0);
}

#[tokio::test]
async fn per_request_headers_override_the_common_set() {
    let transport = ScriptedTransport::replying(b"{}");
    let client = base_client(transport.clone());
    let mut common = HashMap::new();
    common.insert("X-Token".to_owned(), "base".to_owned());
    common.insert("Accept".to_owned(), "application/json".to_owned());
    client.set_common_headers(common);

    join_ok(client.get("/h", RequestOptions::new().header("X-Token", "per-request"))).await;

    let request = transport.last_request();
    let token = request
        .headers
        .iter()
        .find(|(name, _)| name == "X-Token")
        .unwrap();
    assert_eq!(token.1, "per-request");
    assert!(request.headers.iter().any(|(name, _)| name == "Accept"));
}

#[tokio::test]
async fn in_flight_requests_keep_their_config_snapshot() {
    let transport = ScriptedTransport::replying(b"{}");
    let client = base_client(transport.clone());
    client.set_timeout(Duration::from_secs(7));

    let task = client.get("/slow", RequestOptions::new());
    // a reconfiguration midway must not touch the submitted request
    client.set_timeout(Duration::from_secs(1));
    join_ok(task).await;

    assert_eq!(transport.last_request().timeout, Duration::from_secs(7));
}

#[tokio::test]
async fn cache_introspection_reports_and_clears() {
    let transport = ScriptedTransport::replying(br#"{"v":1}"#);
    let client = base_client(transport.clone());

    join_ok(client.get("/list", RequestOptions::new())).await;
    assert!(client.cache_size().unwrap() > 0);

    client.clear_cache().unwrap();
    assert_eq!(client.cache_size().unwrap(), 0);

    // the entry is gone, the next read goes out again
    join_ok(client.get("/list", RequestOptions::new())).await;
    assert_eq!(transport.sends(), 2);
}
