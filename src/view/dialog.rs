use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Tracks whether a dialog is still open so late results can be dropped.
///
/// Closing the scope does not cancel the underlying request; the call runs to
/// completion and its result is discarded.
#[derive(Debug, Clone)]
pub struct DialogScope {
    name: Arc<str>,
    open: Arc<AtomicBool>,
}

impl DialogScope {
    pub fn open(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Awaits `fut`; yields `None` if the dialog closed in the meantime.
    ///
    /// Only the returned value is dropped. Side effects of `fut` still happen,
    /// so a view action settled here still updates the view's copy of the
    /// request even when the dialog is gone.
    pub async fn settle<F, T>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let output = fut.await;
        if self.is_open() {
            Some(output)
        } else {
            debug!(dialog = %self.name, "dialog closed before result arrived; dropping it");
            None
        }
    }
}
