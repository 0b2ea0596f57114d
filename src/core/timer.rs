//! Delayed execution of hook actions on a dedicated tokio runtime.
//!
//! Each armed action is a small async task that sleeps until its delay has
//! elapsed and then runs the action on the runtime's blocking pool. The
//! blocking pool is capped at the configured number of worker slots, so at
//! most that many hook actions run at once; excess due actions wait for a
//! free slot.
//!
//! The armed task owns the only writer of its [`ScheduledHandle`] state. The
//! owner of the handle reads that state and may cancel, but never needs a
//! lock shared with the task.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::action::{run_isolated, ExecutableAction};
use crate::core::hook::HookKey;
use crate::core::AgentError;

const ARMED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

/// Handle to one armed execution.
#[derive(Debug)]
pub struct ScheduledHandle {
    state: Arc<AtomicU8>,
    task: JoinHandle<()>,
}

impl ScheduledHandle {
    /// The action holds a worker slot and has not yet finished. An action
    /// whose timer fired but is still waiting for a slot is not running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// The action ran to completion (successfully or not).
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// The execution was cancelled before it finished.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Cancel the execution. An action that has not claimed a worker slot yet
    /// never runs. An action already running on a blocking thread keeps
    /// running, but the handle reports cancelled unless it had already
    /// finished.
    pub fn cancel(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state != DONE).then_some(CANCELLED)
            });
        self.task.abort();
    }
}

/// Timer facility with a bounded number of execution slots.
pub struct TimerPool {
    runtime: Runtime,
    worker_slots: usize,
}

impl TimerPool {
    /// Build a pool whose blocking executor has `worker_slots` threads.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::InvalidConfig` for zero slots and
    /// `AgentError::Runtime` if the tokio runtime cannot be built.
    pub fn new(worker_slots: usize) -> Result<Self, AgentError> {
        if worker_slots == 0 {
            return Err(AgentError::InvalidConfig(
                "timer pool needs at least one worker slot".into(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(worker_slots)
            .thread_name("hook-timer")
            .enable_time()
            .build()
            .map_err(|e| AgentError::Runtime(format!("build timer runtime: {e}")))?;

        info!(worker_slots = worker_slots, "TimerPool initialized");
        Ok(Self {
            runtime,
            worker_slots,
        })
    }

    /// Number of actions that may run concurrently.
    #[must_use]
    pub const fn worker_slots(&self) -> usize {
        self.worker_slots
    }

    /// Arm `action` to run once `delay` has elapsed. A zero delay fires as
    /// soon as a slot is free.
    pub fn schedule(
        &self,
        key: HookKey,
        action: Box<dyn ExecutableAction>,
        delay: Duration,
    ) -> ScheduledHandle {
        let state = Arc::new(AtomicU8::new(ARMED));
        let task_state = Arc::clone(&state);

        let task = self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if task_state.load(Ordering::Acquire) != ARMED {
                return;
            }

            debug!(hook = %key, "Timer fired, waiting for a worker slot");
            // The blocking task outlives an abort of this task, so the
            // ARMED -> RUNNING claim happens only once a slot is held.
            let run_state = Arc::clone(&task_state);
            let outcome = tokio::task::spawn_blocking(move || {
                if run_state
                    .compare_exchange(ARMED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return None;
                }
                let ok = run_isolated(action.as_ref());
                let _ = run_state.compare_exchange(RUNNING, DONE, Ordering::AcqRel, Ordering::Acquire);
                Some(ok)
            })
            .await;

            match outcome {
                Ok(Some(true)) => debug!(hook = %key, "Scheduled hook action finished"),
                Ok(Some(false)) => warn!(hook = %key, "Scheduled hook action failed"),
                Ok(None) => debug!(hook = %key, "Scheduled hook cancelled before it started"),
                Err(e) => warn!(hook = %key, error = %e, "Scheduled hook action aborted"),
            }
        });

        ScheduledHandle { state, task }
    }

    /// Stop the runtime, waiting up to `timeout` for running actions.
    pub fn shutdown(self, timeout: Duration) {
        info!("Shutting down timer pool");
        self.runtime.shutdown_timeout(timeout);
    }

    /// Stop the runtime without waiting. Safe to call from async context.
    pub fn shutdown_background(self) {
        self.runtime.shutdown_background();
    }
}

impl std::fmt::Debug for TimerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPool")
            .field("worker_slots", &self.worker_slots)
            .finish_non_exhaustive()
    }
}
