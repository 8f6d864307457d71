//! Job submission.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::config::SchedulerConfig;
use super::dispatcher::{Completion, CompletionDispatcher};
use super::job::{JobHandle, JobId, JobState, JobTicket, StateCell};
use super::pool::WorkerPool;
use crate::error::MapResult;

/// Submits job bodies to the worker pool and routes their results back.
///
/// Cloning is cheap; clones share the pool, the id sequence and the
/// dispatcher.
#[derive(Debug, Clone)]
pub struct JobScheduler {
    pool: Arc<WorkerPool>,
    runtime: Handle,
    completions: mpsc::UnboundedSender<Completion>,
    alive: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl JobScheduler {
    /// Creates a scheduler whose jobs run on `runtime`, and the dispatcher
    /// that delivers their completions.
    pub fn new(config: SchedulerConfig, runtime: Handle) -> (Self, CompletionDispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(WorkerPool::new(config.workers, config.label));

        let scheduler = Self {
            pool,
            runtime,
            completions: tx,
            alive: Arc::clone(&alive),
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (scheduler, CompletionDispatcher::new(rx, alive))
    }

    /// Runs `work` in the background and hands its result to `on_complete`
    /// on the dispatcher.
    ///
    /// `target` stays pinned and the dispatcher's in-flight count stays
    /// raised until `on_complete` has returned.
    pub fn submit<T, R, W, C>(&self, target: Arc<T>, name: &str, work: W, on_complete: C) -> JobTicket
    where
        T: ?Sized + Send + Sync + 'static,
        R: Send + 'static,
        W: FnOnce() -> MapResult<R> + Send + 'static,
        C: FnOnce(MapResult<R>) + Send + 'static,
    {
        let id = self.next_id();
        let state = Arc::new(StateCell::new());
        let alive = AliveGuard::new(&self.alive);
        let pool = Arc::clone(&self.pool);
        let tx = self.completions.clone();
        let started = Arc::clone(&state);
        let finished = Arc::clone(&state);
        let name = name.to_string();

        info!(job = %id, name = %name, "Job submitted");

        self.runtime.spawn(async move {
            let result = pool
                .run(move || { started.advance(JobState::Running); }, work)
                .await;
            finished.complete(&result);
            log_finished(id, &name, finished.get());

            let completion: Completion = Box::new(move || {
                let _pin = target;
                let _alive = alive;
                on_complete(result);
            });
            if tx.send(completion).is_err() {
                warn!(job = %id, "Completion dispatcher is gone, dropping result");
            }
        });

        JobTicket::new(id, state)
    }

    /// Runs `work` in the background and returns a future for its result.
    ///
    /// The target is pinned until the result has been handed over. These
    /// jobs bypass the dispatcher and do not count as in flight there.
    pub fn spawn<T, R, W>(&self, target: Arc<T>, name: &str, work: W) -> JobHandle<R>
    where
        T: ?Sized + Send + Sync + 'static,
        R: Send + 'static,
        W: FnOnce() -> MapResult<R> + Send + 'static,
    {
        let id = self.next_id();
        let state = Arc::new(StateCell::new());
        let (tx, rx) = oneshot::channel();
        let pool = Arc::clone(&self.pool);
        let started = Arc::clone(&state);
        let finished = Arc::clone(&state);
        let name = name.to_string();

        info!(job = %id, name = %name, "Job submitted");

        self.runtime.spawn(async move {
            let _pin = target;
            let result = pool
                .run(move || { started.advance(JobState::Running); }, work)
                .await;
            finished.complete(&result);
            log_finished(id, &name, finished.get());
            if tx.send(result).is_err() {
                debug!(job = %id, "Job handle dropped before completion");
            }
        });

        JobHandle::new(id, state, rx)
    }

    /// Returns the worker pool shared by all clones.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn next_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn log_finished(id: JobId, name: &str, state: JobState) {
    info!(job = %id, name = %name, state = %state, "Job finished");
}

/// Holds the dispatcher's in-flight count raised while alive.
struct AliveGuard(Arc<AtomicUsize>);

impl AliveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(counter))
    }
}

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
