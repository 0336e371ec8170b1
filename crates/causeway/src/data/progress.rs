use std::sync::Arc;

/// Byte-level progress of one transfer.
///
/// Downloads and plain requests report response bytes as they stream in;
/// uploads report request bytes as they go out. `total` is `None` when the
/// peer does not announce a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes transferred so far.
    pub transferred: u64,
    /// Expected total, when known.
    pub total: Option<u64>,
}

impl Progress {
    pub fn new(transferred: u64, total: Option<u64>) -> Self {
        Self { transferred, total }
    }

    /// Completion percentage, when the total is known.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.transferred as f64 / total as f64) * 100.0
            }
        })
    }
}

/// Progress sink, invoked at the transport's cadence.
///
/// Delivery stops as soon as a task is cancelled.
pub type ProgressFn = Arc<dyn Fn(&Progress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_needs_a_total() {
        assert_eq!(Progress::new(10, None).percentage(), None);
        assert_eq!(Progress::new(25, Some(100)).percentage(), Some(25.0));
        assert_eq!(Progress::new(0, Some(0)).percentage(), Some(100.0));
    }
}
