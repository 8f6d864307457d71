//! Job identity, lifecycle state and completion handles.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{MapError, MapResult};

// =============================================================================
// Identity and state
// =============================================================================

/// Unique id of a submitted job, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl JobId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle of a job.
///
/// ```text
/// Pending ──► Running ──┬──► CompletedOk
///                       └──► CompletedError
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Submitted, waiting for a worker.
    Pending,
    /// Running on a worker.
    Running,
    /// Finished with a result.
    CompletedOk,
    /// Finished with an error.
    CompletedError,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::CompletedOk | JobState::CompletedError)
    }

    fn as_u8(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Running => 1,
            JobState::CompletedOk => 2,
            JobState::CompletedError => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => JobState::Pending,
            1 => JobState::Running,
            2 => JobState::CompletedOk,
            _ => JobState::CompletedError,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::CompletedOk => "completed",
            JobState::CompletedError => "failed",
        };
        f.write_str(s)
    }
}

/// Shared, forward-only job state.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(JobState::Pending.as_u8()))
    }

    pub(crate) fn get(&self) -> JobState {
        JobState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `next` if that is a forward transition. Returns whether the
    /// state changed.
    pub(crate) fn advance(&self, next: JobState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let from = JobState::from_u8(current);
            let allowed = match (from, next) {
                (JobState::Pending, JobState::Running) => true,
                (JobState::Pending | JobState::Running, s) if s.is_terminal() => true,
                _ => false,
            };
            if !allowed {
                return false;
            }
            match self.0.compare_exchange(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn complete<R>(&self, result: &MapResult<R>) {
        self.advance(if result.is_ok() {
            JobState::CompletedOk
        } else {
            JobState::CompletedError
        });
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Receipt for a job submitted with a completion callback.
#[derive(Debug, Clone)]
pub struct JobTicket {
    id: JobId,
    state: Arc<StateCell>,
}

impl JobTicket {
    pub(crate) fn new(id: JobId, state: Arc<StateCell>) -> Self {
        Self { id, state }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }
}

/// Future resolving to a job's result.
///
/// Dropping the handle does not cancel the job; its result is discarded.
#[derive(Debug)]
pub struct JobHandle<R> {
    id: JobId,
    state: Arc<StateCell>,
    rx: oneshot::Receiver<MapResult<R>>,
}

impl<R> JobHandle<R> {
    pub(crate) fn new(id: JobId, state: Arc<StateCell>, rx: oneshot::Receiver<MapResult<R>>) -> Self {
        Self { id, state, rx }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }
}

impl<R> Future for JobHandle<R> {
    type Output = MapResult<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(MapError::Unknown(format!(
                "{} ended without delivering a result",
                id
            ))),
        })
    }
}
