//! The scan engine: an always-on prepare → dispatch → finalize → idle loop.
//!
//! The loop itself holds no strategy state. Everything that differs between
//! scheduling strategies lives behind [`ScanStrategy`]:
//!
//! - `prepare` runs before the sites are enumerated (record the next-scan deadline)
//! - `dispatch` runs once per site with that site's hooks
//! - `finalize` runs after the last site (cleanup) and returns the deadline the
//!   loop idles until
//!
//! The idle wait is the only suspension point of the loop. It ends early only
//! when a [`ShutdownTrigger`] fires, which the loop treats as the end of its
//! life rather than as something to retry.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use crate::core::action::panic_message;
use crate::core::hook::{Site, SiteSource};
use crate::core::AgentError;

/// Scheduling strategy plugged into a [`ScanAgent`].
pub trait ScanStrategy: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Called at the start of every cycle, before sites are enumerated.
    fn prepare(&mut self);

    /// Handle the hooks of one site. Must not fail the cycle: per-hook and
    /// per-site failures are logged and skipped. A panic is caught by the
    /// agent and skips only this site.
    fn dispatch(&mut self, site: &Arc<dyn Site>);

    /// Called after every site was dispatched. Returns the instant the next
    /// cycle should start.
    fn finalize(&mut self) -> Instant;

    /// Called once when the loop stops.
    fn shutdown(&mut self) {}
}

impl<S: ScanStrategy + ?Sized> ScanStrategy for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn prepare(&mut self) {
        (**self).prepare();
    }

    fn dispatch(&mut self, site: &Arc<dyn Site>) {
        (**self).dispatch(site);
    }

    fn finalize(&mut self) -> Instant {
        (**self).finalize()
    }

    fn shutdown(&mut self) {
        (**self).shutdown();
    }
}

/// Where the agent is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Waiting for the next cycle.
    Idle,
    /// Enumerating sites.
    Scanning,
    /// Handing hooks to the strategy.
    Dispatching,
    /// The loop has ended.
    Stopped,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Dispatching => "dispatching",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Sites handed to the strategy.
    pub sites: usize,
    /// When the next cycle should start.
    pub next_scan: Instant,
}

/// Fires the forced-shutdown signal of an agent's idle wait.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Sender<()>,
}

impl ShutdownTrigger {
    /// Interrupt the agent. Idempotent.
    pub fn fire(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Time left until `deadline`, clamped at zero when it has already passed.
#[must_use]
pub fn idle_duration(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now)
}

/// Scan engine driving one strategy over a set of sites.
pub struct ScanAgent<S: ScanStrategy> {
    strategy: S,
    sites: Arc<dyn SiteSource>,
    state: AgentState,
    cycles: u64,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl<S: ScanStrategy> ScanAgent<S> {
    /// Create an idle agent.
    pub fn new(strategy: S, sites: Arc<dyn SiteSource>) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        Self {
            strategy,
            sites,
            state: AgentState::Idle,
            cycles: 0,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Handle that interrupts this agent's idle wait.
    #[must_use]
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Completed cycles.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The strategy.
    pub const fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Mutable access to the strategy.
    pub fn strategy_mut(&mut self) -> &mut S {
        &mut self.strategy
    }

    /// Run one scan cycle without idling.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;

        self.state = AgentState::Scanning;
        self.strategy.prepare();

        let sites = match self.sites.sites() {
            Ok(sites) => sites,
            Err(e) => {
                warn!(cycle = cycle, error = %e, "Failed to enumerate sites");
                Vec::new()
            }
        };

        self.state = AgentState::Dispatching;
        for site in &sites {
            debug!(cycle = cycle, site = site.id(), "Dispatching site hooks");
            let strategy = &mut self.strategy;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| strategy.dispatch(site))) {
                error!(
                    cycle = cycle,
                    site = site.id(),
                    reason = %panic_message(panic.as_ref()),
                    "Site dispatch panicked, skipping site"
                );
            }
        }

        let next_scan = self.strategy.finalize();
        self.state = AgentState::Idle;

        debug!(
            cycle = cycle,
            strategy = self.strategy.name(),
            sites = sites.len(),
            "Scan cycle complete"
        );

        CycleReport {
            cycle,
            sites: sites.len(),
            next_scan,
        }
    }

    /// Idle until `deadline`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Interrupted` if the shutdown trigger fires first.
    pub fn idle_until(&self, deadline: Instant) -> Result<(), AgentError> {
        match self
            .shutdown_rx
            .recv_timeout(idle_duration(deadline, Instant::now()))
        {
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Ok(()) => Err(AgentError::Interrupted("shutdown requested".into())),
            Err(RecvTimeoutError::Disconnected) => {
                Err(AgentError::Interrupted("shutdown channel closed".into()))
            }
        }
    }

    /// Run cycles until interrupted, then shut the strategy down.
    ///
    /// Returns the interruption that ended the loop.
    pub fn run(&mut self) -> AgentError {
        info!(strategy = self.strategy.name(), "Scan agent started");

        let reason = loop {
            let report = self.run_cycle();
            if let Err(e) = self.idle_until(report.next_scan) {
                break e;
            }
        };

        self.state = AgentState::Stopped;
        self.strategy.shutdown();
        info!(
            strategy = self.strategy.name(),
            cycles = self.cycles,
            reason = %reason,
            "Scan agent stopped"
        );
        reason
    }
}

impl<S: ScanStrategy> fmt::Debug for ScanAgent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanAgent")
            .field("strategy", &self.strategy.name())
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}
