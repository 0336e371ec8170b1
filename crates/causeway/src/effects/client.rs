//! The client: composes the pure route decision with cache, transport,
//! registry, and reachability.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use causeway_cache::{CacheEntry, CacheStore};

use crate::core::{self, CacheRoute, ResolvedRequest, RouteQuery};
use crate::data::{
    Body, Config, DownloadOptions, Method, ProgressFn, Reachability, RequestEncoding,
    RequestOptions, Response, ResponseEncoding, UploadOptions,
};
use crate::effects::reachability::ReachabilityMonitor;
use crate::effects::registry::{Registry, TaskId};
use crate::effects::transport::{MultipartForm, Transport};
use crate::error::Error;

#[cfg(feature = "reqwest")]
use crate::effects::transport::ReqwestTransport;
#[cfg(feature = "reqwest")]
use causeway_cache::{DiskCache, MemoryCache};

/// Terminal outcome of a task.
///
/// `None` means the task was cancelled while cancel callbacks are
/// suppressed; otherwise exactly one success or failure is delivered.
pub type Outcome = Option<Result<Response, Error>>;

struct Shared<T: Transport> {
    transport: T,
    cache: Arc<dyn CacheStore>,
    registry: Arc<Registry>,
    reachability: Arc<ReachabilityMonitor>,
    config: RwLock<Arc<Config>>,
}

/// Unified GET, POST, upload, and download with response caching, offline
/// fallback, and URL-keyed cancellation.
///
/// Cloning is cheap; every clone shares configuration, cache, registry,
/// and reachability state. Requests are dispatched independently onto the
/// runtime, there is no global queue.
pub struct Client<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
    /// A client over the production transport with an in-memory cache.
    pub fn new() -> Result<Self, Error> {
        Ok(Self::with_parts(
            ReqwestTransport::new()?,
            Arc::new(MemoryCache::new()),
        ))
    }

    /// A client whose cache persists under `dir` across restarts.
    pub fn with_cache_dir(dir: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        Ok(Self::with_parts(
            ReqwestTransport::new()?,
            Arc::new(DiskCache::open(dir)?),
        ))
    }
}

impl<T: Transport> Client<T> {
    /// Assemble a client from explicit collaborators.
    pub fn with_parts(transport: T, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                cache,
                registry: Arc::new(Registry::new()),
                reachability: Arc::new(ReachabilityMonitor::new()),
                config: RwLock::new(Arc::new(Config::default())),
            }),
        }
    }

    fn snapshot(&self) -> Arc<Config> {
        Arc::clone(&self.shared.config.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn update_config(&self, mutate: impl FnOnce(&mut Config)) {
        let mut slot = self
            .shared
            .config
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let mut next = (**slot).clone();
        mutate(&mut next);
        *slot = Arc::new(next);
    }

    /// Set the base URL prepended to relative request paths.
    ///
    /// Requests already in flight keep the snapshot they were resolved
    /// under.
    pub fn set_base_url(&self, base: &str) -> Result<(), Error> {
        let parsed = Url::parse(base)?;
        self.update_config(|c| c.base_url = Some(parsed));
        Ok(())
    }

    /// The configured base URL, if any.
    pub fn base_url(&self) -> Option<Url> {
        self.snapshot().base_url.clone()
    }

    /// Set the whole-exchange timeout (default 60 s).
    pub fn set_timeout(&self, timeout: Duration) {
        self.update_config(|c| c.timeout = timeout);
    }

    /// Percent-encode caller-supplied paths and URLs (default off).
    pub fn set_auto_encode_url(&self, enabled: bool) {
        self.update_config(|c| c.auto_encode_url = enabled);
    }

    /// Deliver a cancellation error to cancelled tasks (default on). When
    /// off, a cancelled task's outcome is suppressed entirely.
    pub fn set_callback_on_cancel(&self, enabled: bool) {
        self.update_config(|c| c.callback_on_cancel = enabled);
    }

    /// Replace the headers merged into every request. Expected to be
    /// called once during startup, before traffic.
    pub fn set_common_headers(&self, headers: HashMap<String, String>) {
        self.update_config(|c| c.common_headers = headers);
    }

    /// Enable caching per method (GET default on, POST default off).
    pub fn set_cache_enabled(&self, get: bool, post: bool) {
        self.update_config(|c| {
            c.cache_get = get;
            c.cache_post = post;
        });
    }

    /// Serve cached payloads when the network is unreachable (default
    /// off).
    pub fn set_offline_fallback(&self, enabled: bool) {
        self.update_config(|c| c.offline_fallback = enabled);
    }

    /// Gate the per-request lifecycle logs (default off).
    pub fn set_debug(&self, enabled: bool) {
        self.update_config(|c| c.debug = enabled);
    }

    /// Default request and response encodings (both default JSON).
    pub fn set_encodings(&self, request: RequestEncoding, response: ResponseEncoding) {
        self.update_config(|c| {
            c.request_encoding = request;
            c.response_encoding = response;
        });
    }

    /// Total size of the cached data in bytes.
    pub fn cache_size(&self) -> Result<u64, Error> {
        Ok(self.shared.cache.total_size()?)
    }

    /// Drop every cached payload.
    pub fn clear_cache(&self) -> Result<(), Error> {
        Ok(self.shared.cache.clear()?)
    }

    /// Latest observed reachability.
    pub fn reachability(&self) -> Reachability {
        self.shared.reachability.current()
    }

    /// The reachability monitor, for feeding connectivity observations and
    /// registering change listeners.
    pub fn monitor(&self) -> &ReachabilityMonitor {
        &self.shared.reachability
    }

    /// Number of in-flight tasks.
    pub fn active_tasks(&self) -> usize {
        self.shared.registry.active()
    }

    /// Cancel every in-flight task. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        self.shared.registry.cancel_all()
    }

    /// Cancel every in-flight task registered under the given URL.
    ///
    /// The argument may be a relative path or an absolute URL; it is
    /// resolved exactly like a request, so both forms cancel the same
    /// tasks.
    pub fn cancel_by_url(&self, path_or_url: &str) -> Result<usize, Error> {
        let config = self.snapshot();
        let url = core::resolve_url(&config, path_or_url)?;
        Ok(self.shared.registry.cancel_by_url(url.as_str()))
    }

    /// Issue a GET request.
    pub fn get(&self, path_or_url: &str, options: RequestOptions) -> TaskHandle {
        self.submit(Method::Get, path_or_url, options)
    }

    /// Issue a POST request.
    ///
    /// POSTs only participate in caching when the POST cache flag is on.
    pub fn post(&self, path_or_url: &str, options: RequestOptions) -> TaskHandle {
        self.submit(Method::Post, path_or_url, options)
    }

    fn submit(&self, method: Method, path_or_url: &str, options: RequestOptions) -> TaskHandle {
        let config = self.snapshot();
        let endpoint = match core::resolve_url(&config, path_or_url) {
            Ok(url) => url,
            Err(e) => return TaskHandle::rejected(Arc::clone(&self.shared.registry), e),
        };

        let request = core::build_request(&config, method, &endpoint, &options);
        let key = core::cache_key(&endpoint, &options.params);
        let cacheable = core::is_cacheable(method, &config);
        // The cache is probed only for cacheable requests; an uncacheable
        // one must not touch the store at all.
        let entry = if cacheable { self.probe_cache(&key) } else { None };
        let route = core::cache_route(&RouteQuery {
            cacheable,
            refresh: options.refresh_cache,
            entry_exists: entry.is_some(),
            reachability: self.shared.reachability.current(),
            offline_fallback: config.offline_fallback,
        });

        if config.debug {
            debug!(
                method = method.as_str(),
                url = %request.url,
                route = ?route,
                "dispatching request"
            );
        }

        let encoding = options.response_encoding.unwrap_or(config.response_encoding);
        self.spawn_task(
            endpoint,
            config,
            Job::Routed(RoutedJob {
                request,
                route,
                key,
                entry,
                encoding,
                progress: options.on_progress,
            }),
        )
    }

    /// Upload file parts and scalar fields as a multipart form.
    ///
    /// Uploads never read or write the cache.
    pub fn upload(&self, path_or_url: &str, options: UploadOptions) -> TaskHandle {
        let config = self.snapshot();
        let endpoint = match core::resolve_url(&config, path_or_url) {
            Ok(url) => url,
            Err(e) => return TaskHandle::rejected(Arc::clone(&self.shared.registry), e),
        };

        let request = core::build_plain(&config, Method::Post, &endpoint, &options.headers);
        let form = MultipartForm::new(options.parts, &options.params);
        if config.debug {
            debug!(url = %request.url, parts = form.parts.len(), "dispatching upload");
        }

        let encoding = options.response_encoding.unwrap_or(config.response_encoding);
        self.spawn_task(
            endpoint,
            config,
            Job::Upload {
                request,
                form,
                encoding,
                progress: options.on_progress,
            },
        )
    }

    /// Stream a response body to `dest`, reporting read progress.
    ///
    /// The outcome carries the destination path.
    pub fn download(
        &self,
        path_or_url: &str,
        dest: impl Into<PathBuf>,
        options: DownloadOptions,
    ) -> TaskHandle {
        let config = self.snapshot();
        let endpoint = match core::resolve_url(&config, path_or_url) {
            Ok(url) => url,
            Err(e) => return TaskHandle::rejected(Arc::clone(&self.shared.registry), e),
        };

        let request = core::build_plain(&config, Method::Get, &endpoint, &options.headers);
        if config.debug {
            debug!(url = %request.url, "dispatching download");
        }

        self.spawn_task(
            endpoint,
            config,
            Job::Download {
                request,
                dest: dest.into(),
                progress: options.on_progress,
            },
        )
    }

    fn probe_cache(&self, key: &str) -> Option<CacheEntry> {
        match self.shared.cache.get(key) {
            Ok(entry) => entry,
            Err(e) => {
                // A broken cache read is a miss, not a request failure.
                warn!(key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    fn spawn_task(&self, endpoint: Url, config: Arc<Config>, job: Job) -> TaskHandle {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let registry = Arc::clone(&self.shared.registry);
        let id = registry.register(endpoint.as_str(), cancel_tx);
        let (outcome_tx, outcome_rx) = oneshot::channel::<Outcome>();

        let shared = Arc::clone(&self.shared);
        let task_url = endpoint.clone();
        tokio::spawn(async move {
            let finished = tokio::select! {
                biased;
                _ = &mut cancel_rx => None,
                result = run_job(&shared, &config, job) => Some(result),
            };
            shared.registry.complete(id);

            let outcome: Outcome = match finished {
                Some(result) => {
                    if config.debug {
                        match &result {
                            Ok(response) => debug!(
                                url = %task_url,
                                from_cache = response.from_cache,
                                "request finished"
                            ),
                            Err(e) => debug!(url = %task_url, error = %e, "request failed"),
                        }
                    }
                    Some(result)
                }
                None => {
                    if config.debug {
                        debug!(url = %task_url, "request cancelled");
                    }
                    if config.callback_on_cancel {
                        Some(Err(Error::Cancelled))
                    } else {
                        None
                    }
                }
            };
            // The receiver may be gone when the caller dropped the handle.
            let _ = outcome_tx.send(outcome);
        });

        TaskHandle {
            id: Some(id),
            url: Some(endpoint),
            registry,
            outcome: outcome_rx,
        }
    }
}

/// Work a spawned task executes after the route decision is made.
enum Job {
    Routed(RoutedJob),
    Upload {
        request: ResolvedRequest,
        form: MultipartForm,
        encoding: ResponseEncoding,
        progress: Option<ProgressFn>,
    },
    Download {
        request: ResolvedRequest,
        dest: PathBuf,
        progress: Option<ProgressFn>,
    },
}

/// A GET or POST with its route decision already made.
struct RoutedJob {
    request: ResolvedRequest,
    route: CacheRoute,
    key: String,
    entry: Option<CacheEntry>,
    encoding: ResponseEncoding,
    progress: Option<ProgressFn>,
}

async fn run_job<T: Transport>(
    shared: &Shared<T>,
    config: &Config,
    job: Job,
) -> Result<Response, Error> {
    match job {
        Job::Routed(routed) => run_routed(shared, config, routed).await,
        Job::Upload {
            request,
            form,
            encoding,
            progress,
        } => {
            let payload = shared.transport.upload(&request, form, progress).await?;
            let (body, _) = decode_body(payload, encoding);
            Ok(Response::network(body))
        }
        Job::Download {
            request,
            dest,
            progress,
        } => {
            shared.transport.download(&request, &dest, progress).await?;
            Ok(Response::network(Body::File(dest)))
        }
    }
}

async fn run_routed<T: Transport>(
    shared: &Shared<T>,
    config: &Config,
    job: RoutedJob,
) -> Result<Response, Error> {
    let RoutedJob {
        request,
        route,
        key,
        entry,
        encoding,
        progress,
    } = job;
    match route {
        CacheRoute::Network => {
            let payload = shared.transport.send(&request, progress).await?;
            let (body, _) = decode_body(payload, encoding);
            Ok(Response::network(body))
        }
        CacheRoute::CacheOnly => match entry {
            Some(entry) => {
                if config.debug {
                    debug!(key = %key, "serving cached payload");
                }
                let (body, _) = decode_body(Bytes::from(entry.payload), encoding);
                Ok(Response::cached(body))
            }
            // The route decision picks CacheOnly only when an entry
            // exists; treat a vanished entry as a miss.
            None => {
                let payload = shared.transport.send(&request, progress).await?;
                let (body, _) = decode_body(payload, encoding);
                Ok(Response::network(body))
            }
        },
        CacheRoute::NetworkThenCache { overwrite } => {
            let payload = shared.transport.send(&request, progress).await?;
            let (body, decoded) = decode_body(payload.clone(), encoding);
            if decoded {
                write_through(shared, &key, &payload, overwrite, config.debug);
            }
            Ok(Response::network(body))
        }
        CacheRoute::CacheOnFailure => match shared.transport.send(&request, progress).await {
            Ok(payload) => {
                let (body, decoded) = decode_body(payload.clone(), encoding);
                if decoded {
                    write_through(shared, &key, &payload, true, config.debug);
                }
                Ok(Response::network(body))
            }
            Err(transport_err) => match entry {
                Some(entry) => {
                    if config.debug {
                        debug!(
                            key = %key,
                            error = %transport_err,
                            "transport failed, serving cached payload"
                        );
                    }
                    let (body, _) = decode_body(Bytes::from(entry.payload), encoding);
                    Ok(Response::cached(body))
                }
                None => Err(transport_err.into()),
            },
        },
    }
}

/// Write a payload through to the cache after a successful fetch.
///
/// A failed cache write is logged and swallowed; it must never fail the
/// request that produced the payload.
fn write_through<T: Transport>(
    shared: &Shared<T>,
    key: &str,
    payload: &[u8],
    overwrite: bool,
    debug_enabled: bool,
) {
    let written = if overwrite {
        shared.cache.put(key, payload).map(|()| true)
    } else {
        shared.cache.put_if_absent(key, payload)
    };
    match written {
        Ok(true) if debug_enabled => debug!(key = %key, bytes = payload.len(), "cache updated"),
        Ok(_) => {}
        Err(e) => warn!(key = %key, error = %e, "cache write failed"),
    }
}

/// Decode a payload under the effective response encoding.
///
/// Returns the body plus whether decoding succeeded. A payload that does
/// not match the configured shape is delivered raw instead of failing the
/// request, and is never written to the cache.
fn decode_body(payload: Bytes, encoding: ResponseEncoding) -> (Body, bool) {
    match encoding {
        ResponseEncoding::Json => match serde_json::from_slice(&payload) {
            Ok(value) => (Body::Json(value), true),
            Err(_) => (Body::Raw(payload), false),
        },
        ResponseEncoding::Xml => match std::str::from_utf8(&payload) {
            Ok(text) => (Body::Xml(text.to_owned()), true),
            Err(_) => (Body::Raw(payload), false),
        },
        ResponseEncoding::Raw => (Body::Raw(payload), true),
    }
}

/// Handle to one submitted task.
///
/// Await [`join`](Self::join) for the terminal outcome: exactly one
/// success or failure, or `None` when the task was cancelled with cancel
/// callbacks suppressed. Dropping the handle detaches the task without
/// cancelling it.
pub struct TaskHandle {
    id: Option<TaskId>,
    url: Option<Url>,
    registry: Arc<Registry>,
    outcome: oneshot::Receiver<Outcome>,
}

impl TaskHandle {
    /// A handle whose submission failed before anything was dispatched.
    fn rejected(registry: Arc<Registry>, error: Error) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Some(Err(error)));
        Self {
            id: None,
            url: None,
            registry,
            outcome: rx,
        }
    }

    /// Registry id of the task; absent when submission was rejected.
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Resolved endpoint URL the task is registered under; absent when
    /// submission was rejected.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Cancel this task. Returns `false` when it already finished.
    pub fn cancel(&self) -> bool {
        match self.id {
            Some(id) => self.registry.cancel(id),
            None => false,
        }
    }

    /// Wait for the terminal outcome.
    pub async fn join(self) -> Outcome {
        self.outcome.await.ok().flatten()
    }
}
