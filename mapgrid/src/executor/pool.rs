//! Bounded worker pool for blocking job bodies.
//!
//! Rasterization and image encoding are CPU-bound, so job bodies run on
//! tokio's blocking thread pool. A semaphore caps how many of them run at
//! once; jobs beyond the cap wait for a permit in submission order.
//!
//! ```text
//! submit ──► acquire permit ──► spawn_blocking(work) ──► release permit
//!              (waits when                 │
//!               pool is full)              └─ panic ──► MapError::Unknown
//! ```

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{MapError, MapResult};

/// Worker count used when the CPU count cannot be determined.
pub const FALLBACK_WORKERS: usize = 4;

/// Returns the number of workers to use by default.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(FALLBACK_WORKERS)
}

/// Semaphore-gated pool running job bodies on blocking threads.
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    workers: usize,
    /// Shared with permits so they can be moved into spawned tasks.
    in_flight: Arc<AtomicUsize>,
    label: String,
}

impl WorkerPool {
    /// Creates a pool running at most `workers` bodies at once (minimum 1).
    pub fn new(workers: usize, label: impl Into<String>) -> Self {
        let workers = workers.max(1);
        let label = label.into();

        tracing::info!(workers, label = %label, "Created worker pool");

        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            in_flight: Arc::new(AtomicUsize::new(0)),
            label,
        }
    }

    /// Creates a pool sized to the available CPUs.
    pub fn with_defaults(label: impl Into<String>) -> Self {
        Self::new(default_workers(), label)
    }

    /// Runs `work` on a blocking thread once a permit is free.
    ///
    /// `on_start` runs on the worker thread right before `work`. A panic in
    /// either is reported as [`MapError::Unknown`].
    pub async fn run<R, S, F>(&self, on_start: S, work: F) -> MapResult<R>
    where
        R: Send + 'static,
        S: FnOnce() + Send + 'static,
        F: FnOnce() -> MapResult<R> + Send + 'static,
    {
        let permit = self.acquire().await?;
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            on_start();
            work()
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(MapError::Unknown(format!(
                "job panicked: {}",
                panic_message(e.into_panic())
            ))),
            Err(e) => Err(MapError::Unknown(format!("job was aborted: {}", e))),
        }
    }

    async fn acquire(&self) -> MapResult<WorkerPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| MapError::Unknown(format!("worker pool '{}' is closed", self.label)))?;
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        Ok(WorkerPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the maximum number of concurrently running bodies.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the number of bodies currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the number of free worker slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A running slot in the pool, released on drop.
struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
