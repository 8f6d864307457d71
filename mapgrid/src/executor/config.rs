//! Scheduler configuration.

use super::pool::default_workers;

/// Default label for the scheduler's worker pool.
pub const DEFAULT_SCHEDULER_LABEL: &str = "render";

/// Configuration for [`JobScheduler`](super::JobScheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum number of job bodies running at once.
    pub workers: usize,
    /// Label used in log output.
    pub label: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            label: DEFAULT_SCHEDULER_LABEL.to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
