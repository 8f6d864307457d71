//! Completion delivery.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

/// A finished job's completion: runs the handler, then releases the job's
/// pin and in-flight count.
pub(crate) type Completion = Box<dyn FnOnce() + Send>;

/// Runs completion handlers on the task that owns it.
///
/// Handlers run one at a time in job-finish order. A panicking handler is
/// not caught.
#[derive(Debug)]
pub struct CompletionDispatcher {
    rx: mpsc::UnboundedReceiver<Completion>,
    alive: Arc<AtomicUsize>,
}

impl CompletionDispatcher {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Completion>, alive: Arc<AtomicUsize>) -> Self {
        Self { rx, alive }
    }

    /// Delivers completions until no submitted job is in flight.
    ///
    /// Returns the number of handlers run.
    pub async fn run(&mut self) -> usize {
        let mut delivered = 0;
        while self.in_flight() > 0 {
            let Some(completion) = self.rx.recv().await else {
                break;
            };
            completion();
            delivered += 1;
        }
        debug!(delivered, "Dispatcher idle");
        delivered
    }

    /// Delivers the completions that are ready now, without waiting.
    pub fn dispatch_ready(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(completion) = self.rx.try_recv() {
            completion();
            delivered += 1;
        }
        delivered
    }

    /// Number of submitted jobs whose handler has not yet returned.
    pub fn in_flight(&self) -> usize {
        self.alive.load(Ordering::Acquire)
    }
}
