//! Background job execution.
//!
//! Render and grid jobs run off the calling task on a bounded worker pool.
//! Each job pins its target object until its result has been delivered.
//!
//! # Architecture
//!
//! ```text
//!  caller ── submit(target, work, on_complete) ──► JobScheduler
//!                                                      │ pin target
//!                                                      │ in_flight += 1
//!                                                      ▼
//!                                               WorkerPool (semaphore)
//!                                                      │ spawn_blocking(work)
//!                                                      ▼
//!                                           Completion (mpsc channel)
//!                                                      │
//!  caller ◄──────── on_complete(result) ──── CompletionDispatcher
//!                                                        unpin, in_flight -= 1
//! ```
//!
//! `spawn` is the future-based variant: the result goes through a oneshot
//! channel to a [`JobHandle`] instead of the dispatcher.
//!
//! # Example
//!
//! ```ignore
//! let (scheduler, mut dispatcher) = JobScheduler::new(SchedulerConfig::default(), Handle::current());
//! scheduler.submit(target, "grid", move || work(), |result| println!("{:?}", result));
//! dispatcher.run().await;
//! ```

mod config;
mod dispatcher;
mod job;
mod pool;
mod scheduler;

pub use config::{SchedulerConfig, DEFAULT_SCHEDULER_LABEL};
pub use dispatcher::CompletionDispatcher;
pub use job::{JobHandle, JobId, JobState, JobTicket};
pub use pool::{default_workers, WorkerPool, FALLBACK_WORKERS};
pub use scheduler::JobScheduler;
