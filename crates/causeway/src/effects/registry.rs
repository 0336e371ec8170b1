//! In-flight task registry.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Opaque identifier of one in-flight task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

struct InFlight {
    url: String,
    cancel: oneshot::Sender<()>,
}

#[derive(Default)]
struct Book {
    next_id: u64,
    tasks: HashMap<u64, InFlight>,
    by_url: HashMap<String, HashSet<u64>>,
}

/// Tracks every in-flight operation for targeted cancellation.
///
/// This is the single serialization point shared by concurrent requests.
/// The mutex guards map bookkeeping only and is never held across network
/// or cache I/O; cancel signals are sent after the lock is released.
/// Several tasks may share one URL, so the URL index maps each resolved
/// URL to the set of live task ids under it.
#[derive(Default)]
pub struct Registry {
    book: Mutex<Book>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Track a new task; `cancel` fires when the task is cancelled.
    pub fn register(&self, url: &str, cancel: oneshot::Sender<()>) -> TaskId {
        let mut book = self.lock();
        let id = book.next_id;
        book.next_id += 1;
        book.tasks.insert(
            id,
            InFlight {
                url: url.to_owned(),
                cancel,
            },
        );
        book.by_url.entry(url.to_owned()).or_default().insert(id);
        TaskId(id)
    }

    /// Drop a finished task without cancelling it. Returns `false` when the
    /// task was already gone.
    pub fn complete(&self, id: TaskId) -> bool {
        let mut book = self.lock();
        remove(&mut book, id.0).is_some()
    }

    /// Cancel one task. Returns `false` when it already finished.
    pub fn cancel(&self, id: TaskId) -> bool {
        let task = {
            let mut book = self.lock();
            remove(&mut book, id.0)
        };
        match task {
            Some(task) => {
                let _ = task.cancel.send(());
                true
            }
            None => false,
        }
    }

    /// Cancel every tracked task. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<InFlight> = {
            let mut book = self.lock();
            book.by_url.clear();
            book.tasks.drain().map(|(_, task)| task).collect()
        };
        let count = drained.len();
        for task in drained {
            let _ = task.cancel.send(());
        }
        count
    }

    /// Cancel every task registered under exactly `url`. Returns how many
    /// were cancelled.
    pub fn cancel_by_url(&self, url: &str) -> usize {
        let drained: Vec<InFlight> = {
            let mut book = self.lock();
            let ids = book.by_url.remove(url).unwrap_or_default();
            ids.into_iter()
                .filter_map(|id| book.tasks.remove(&id))
                .collect()
        };
        let count = drained.len();
        for task in drained {
            let _ = task.cancel.send(());
        }
        count
    }

    /// Number of tasks currently tracked.
    pub fn active(&self) -> usize {
        self.lock().tasks.len()
    }
}

fn remove(book: &mut Book, id: u64) -> Option<InFlight> {
    let task = book.tasks.remove(&id)?;
    if let Some(ids) = book.by_url.get_mut(&task.url) {
        ids.remove(&id);
        if ids.is_empty() {
            book.by_url.remove(&task.url);
        }
    }
    Some(task)
}
