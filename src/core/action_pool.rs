//! Worker pool that runs hook actions as soon as they are submitted.
//!
//! Dedicated OS threads block on a bounded channel; submission never blocks
//! and fails fast when the queue is full. Each action runs with panic
//! isolation, so one failing hook cannot take a worker down.
//!
//! # Design Principles
//!
//! - **No polling**: Workers block on channel recv
//! - **Clean shutdown**: Dropping the sender unblocks workers naturally
//! - **Lock-free stats**: Atomic counters, snapshot on demand

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ActionPoolConfig;
use crate::core::action::{run_isolated, ExecutableAction};
use crate::core::hook::HookKey;
use crate::core::AgentError;

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Currently executing actions.
    pub active: u64,
    /// Actions waiting in the queue.
    pub queued: u64,
    /// Actions that ran to completion.
    pub completed: u64,
    /// Actions that panicked.
    pub panicked: u64,
    /// Actions accepted by `submit`.
    pub submitted: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    active: AtomicU64,
    queued: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    submitted: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active: self.active.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
        }
    }
}

/// An action queued for a worker.
struct Job {
    key: HookKey,
    action: Box<dyn ExecutableAction>,
}

/// Fixed-size pool of dispatch threads.
pub struct ActionPool {
    config: ActionPoolConfig,
    job_tx: Mutex<Option<Sender<Job>>>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ActionPool {
    /// Spawn `config.worker_count` dispatch threads.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::InvalidConfig` for an invalid configuration and
    /// `AgentError::Runtime` if a worker thread cannot be spawned.
    pub fn new(config: ActionPoolConfig) -> Result<Self, AgentError> {
        config.validate().map_err(AgentError::InvalidConfig)?;

        let (job_tx, job_rx) = bounded::<Job>(config.max_queue_depth);
        let counters = Arc::new(PoolCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = spawn_worker(
                worker_id,
                job_rx.clone(),
                Arc::clone(&counters),
                Arc::clone(&shutdown),
                config.thread_stack_size,
            )
            .map_err(|e| AgentError::Runtime(format!("spawn dispatch worker {worker_id}: {e}")))?;
            workers.push(worker);
        }

        info!(
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            "ActionPool initialized"
        );

        Ok(Self {
            config,
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown,
            workers: Mutex::new(workers),
        })
    }

    /// Queue an action for immediate execution. Never blocks.
    ///
    /// # Errors
    ///
    /// - `AgentError::QueueFull` if the queue is full
    /// - `AgentError::Interrupted` if the pool has been shut down
    pub fn submit(&self, key: HookKey, action: Box<dyn ExecutableAction>) -> Result<(), AgentError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(AgentError::Interrupted("action pool is shut down".into()));
        }

        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            return Err(AgentError::Interrupted("action pool is shut down".into()));
        };

        // Count before sending so a fast worker never decrements below zero.
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        match job_tx.try_send(Job { key, action }) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                warn!(hook = %job.key, "Action pool queue is full");
                Err(AgentError::QueueFull(job.key.to_string()))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                Err(AgentError::Interrupted("action pool is shut down".into()))
            }
        }
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Shut the pool down, letting running actions finish.
    ///
    /// Idle workers exit once the sender is dropped; each worker gets up to
    /// `join_timeout` to finish before it is detached. Queued actions that
    /// have not started are discarded.
    pub fn shutdown(&self, join_timeout: Duration) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down action pool");
        self.job_tx.lock().take();

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = bounded(1);
            let join_thread = thread::spawn(move || {
                let _ = tx.send(worker.join().is_ok());
            });
            match rx.recv_timeout(join_timeout) {
                Ok(true) => debug!(worker_id = idx, "Worker joined"),
                Ok(false) => warn!(worker_id = idx, "Worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "Worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }

        info!(worker_count = worker_count, "Action pool shut down complete");
    }
}

impl Drop for ActionPool {
    fn drop(&mut self) {
        // Signal only; explicit shutdown() is required to join workers.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.job_tx.lock().take();
            debug!("ActionPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

fn spawn_worker(
    worker_id: usize,
    job_rx: Receiver<Job>,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("hook-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Dispatch worker started");

            // recv() fails once every sender is dropped.
            while let Ok(job) = job_rx.recv() {
                counters.queued.fetch_sub(1, Ordering::Relaxed);
                if shutdown.load(Ordering::Acquire) {
                    debug!(worker_id = worker_id, hook = %job.key, "Discarding queued action on shutdown");
                    continue;
                }

                counters.active.fetch_add(1, Ordering::Relaxed);
                debug!(worker_id = worker_id, hook = %job.key, "Worker running hook action");

                if run_isolated(job.action.as_ref()) {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                } else {
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    warn!(worker_id = worker_id, hook = %job.key, "Hook action failed");
                }
                counters.active.fetch_sub(1, Ordering::Relaxed);
            }

            debug!(worker_id = worker_id, "Dispatch worker exiting");
        })
}
