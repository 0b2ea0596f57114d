//! Worker pool configuration for immediate hook dispatch.

use serde::{Deserialize, Serialize};

/// Default stack size for dispatch worker threads (2 MiB).
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Default number of queued actions before submissions are rejected.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Configuration for [`ActionPool`](crate::core::ActionPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPoolConfig {
    /// Number of dedicated worker threads.
    pub worker_count: usize,
    /// Maximum queued actions before submission fails.
    pub max_queue_depth: usize,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
}

impl Default for ActionPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            max_queue_depth: DEFAULT_QUEUE_DEPTH,
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl ActionPoolConfig {
    /// Configuration with one worker per CPU.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the queue depth.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the worker stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}
