//! Round-robin strategy: rescan every site on a fixed period and run every
//! waiting hook straight away.
//!
//! Execution precision is bounded by the scan period, so the period should be
//! short relative to how far apart hooks are due.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::core::action::ActionFactory;
use crate::core::action_pool::{ActionPool, PoolStats};
use crate::core::agent::ScanStrategy;
use crate::core::hook::{HookKey, Site};
use crate::util::clock::{Clock, SystemClock};

/// Default period between scans.
pub const DEFAULT_SCAN_PERIOD: Duration = Duration::from_secs(300);

const POOL_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Fire-and-forget dispatch of waiting hooks.
pub struct RoundRobinStrategy {
    factory: Arc<dyn ActionFactory>,
    pool: ActionPool,
    clock: Arc<dyn Clock>,
    period: Duration,
    next_scan: Instant,
}

impl RoundRobinStrategy {
    /// Create a strategy that submits actions to `pool`.
    pub fn new(factory: Arc<dyn ActionFactory>, pool: ActionPool) -> Self {
        Self {
            factory,
            pool,
            clock: Arc::new(SystemClock),
            period: DEFAULT_SCAN_PERIOD,
            next_scan: Instant::now(),
        }
    }

    /// Set the scan period.
    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Use `clock` to decide which hooks are waiting.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Statistics of the dispatch pool.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl ScanStrategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn prepare(&mut self) {
        self.next_scan = Instant::now() + self.period;
    }

    fn dispatch(&mut self, site: &Arc<dyn Site>) {
        let hooks = match site.waiting_hooks(self.clock.now()) {
            Ok(hooks) => hooks,
            Err(e) => {
                warn!(site = site.id(), error = %e, "Failed to list waiting hooks");
                return;
            }
        };

        for hook in &hooks {
            let key = HookKey::new(site.id(), hook);
            let submitted = self
                .factory
                .create(site, hook)
                .and_then(|action| self.pool.submit(key.clone(), action));
            if let Err(e) = submitted {
                warn!(hook = %key, error = %e, "Hook dispatch failed");
            }
        }
    }

    fn finalize(&mut self) -> Instant {
        self.next_scan
    }

    fn shutdown(&mut self) {
        self.pool.shutdown(POOL_JOIN_TIMEOUT);
    }
}

impl std::fmt::Debug for RoundRobinStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundRobinStrategy")
            .field("period", &self.period)
            .field("pool", &self.pool.stats())
            .finish_non_exhaustive()
    }
}
