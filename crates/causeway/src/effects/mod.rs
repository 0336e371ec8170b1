//! I/O boundary: transport execution, task registry, reachability, and
//! the client that composes them.

mod client;
mod reachability;
mod registry;
mod transport;

pub use client::{Client, Outcome, TaskHandle};
pub use reachability::ReachabilityMonitor;
pub use registry::{Registry, TaskId};
pub use transport::{MultipartForm, Transport};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
