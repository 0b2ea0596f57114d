//! Runs a scan agent on a dedicated OS thread.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;
use tracing::{info, warn};

use crate::core::{AgentError, ScanAgent, ScanStrategy, ShutdownTrigger};

/// How an agent thread ended.
#[derive(Debug)]
pub struct AgentOutcome {
    /// The interruption that ended the loop.
    pub reason: AgentError,
    /// Cycles completed before stopping.
    pub cycles: u64,
}

/// Owner handle of a running agent thread.
#[derive(Debug)]
pub struct AgentHandle {
    name: String,
    trigger: ShutdownTrigger,
    thread: JoinHandle<AgentOutcome>,
}

impl AgentHandle {
    /// Thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the loop has already ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Trigger that stops the agent without consuming the handle.
    #[must_use]
    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Interrupt the agent and wait up to `timeout` for its thread to end.
    ///
    /// Returns `None` if the thread did not finish in time (it is detached)
    /// or panicked.
    #[must_use]
    pub fn shutdown(self, timeout: Duration) -> Option<AgentOutcome> {
        self.trigger.fire();

        let name = self.name;
        let (tx, rx) = bounded(1);
        let thread = self.thread;
        let join_thread = thread::spawn(move || {
            let _ = tx.send(thread.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(outcome)) => {
                let _ = join_thread.join();
                info!(agent = %name, cycles = outcome.cycles, "Agent thread joined");
                Some(outcome)
            }
            Ok(Err(_)) => {
                let _ = join_thread.join();
                warn!(agent = %name, "Agent thread panicked");
                None
            }
            Err(_) => {
                warn!(agent = %name, "Agent thread did not exit within timeout - detaching");
                None
            }
        }
    }
}

/// Start `agent` on its own named thread.
///
/// # Errors
///
/// Returns `AgentError::Runtime` if the thread cannot be spawned.
pub fn spawn_agent<S>(mut agent: ScanAgent<S>) -> Result<AgentHandle, AgentError>
where
    S: ScanStrategy + 'static,
{
    let name = format!("scan-agent-{}", agent.strategy().name());
    let trigger = agent.shutdown_trigger();

    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let reason = agent.run();
            AgentOutcome {
                reason,
                cycles: agent.cycles(),
            }
        })
        .map_err(|e| AgentError::Runtime(format!("spawn {name}: {e}")))?;

    Ok(AgentHandle {
        name,
        trigger,
        thread,
    })
}
