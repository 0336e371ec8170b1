//! Reachability monitor.

use std::sync::{Mutex, RwLock};

use tracing::debug;

use crate::data::Reachability;

type ChangeListener = Box<dyn Fn(Reachability) + Send + Sync>;

/// Latest-observed network connectivity.
///
/// External connectivity probes feed [`update`](Self::update); requests
/// sample [`current`](Self::current) once at submission time. No
/// transition is ever synchronous with a request, so the route decision
/// accepts a bounded staleness window instead of blocking on a probe.
pub struct ReachabilityMonitor {
    state: RwLock<Reachability>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl ReachabilityMonitor {
    /// Start in the `Unknown` state.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Reachability::Unknown),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// The latest observed state.
    pub fn current(&self) -> Reachability {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an observation and notify listeners when the state changed.
    pub fn update(&self, next: Reachability) {
        let changed = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            let changed = *state != next;
            *state = next;
            changed
        };
        if !changed {
            return;
        }

        debug!(state = ?next, "reachability changed");
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(next);
        }
    }

    /// Register a callback invoked on every state change.
    pub fn on_change(&self, listener: impl Fn(Reachability) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }
}

impl Default for ReachabilityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
