//! Immutable configuration and request/response types.
//!
//! Everything here is built once at submission time and carried through
//! the pipeline without mutation. Requests read a configuration snapshot,
//! never live state, so setter calls cannot affect work already in flight.

pub mod config;
pub mod progress;
pub mod reachability;
pub mod request;
pub mod response;

pub use config::{Config, RequestEncoding, ResponseEncoding, DEFAULT_TIMEOUT};
pub use progress::{Progress, ProgressFn};
pub use reachability::Reachability;
pub use request::{
    DownloadOptions, FilePart, Method, ParamValue, Params, PartSource, RequestOptions,
    UploadOptions,
};
pub use response::{Body, Response};
