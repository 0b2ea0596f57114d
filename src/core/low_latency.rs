//! Low-latency strategy: a coarse scan discovers hooks, a fine-grained timer
//! runs each one at its due time.
//!
//! Every occurrence a site reports, due or not, is armed on the
//! [`TimerPool`] with a delay of `max(0, due - now)`. Armed occurrences are
//! remembered by [`HookKey`], so rescans never arm the same occurrence twice.
//!
//! At the end of each cycle an eviction pass runs before the agent idles:
//! records overdue by more than the grace window are cancelled, then every
//! cancelled or finished record is dropped from the cache. Records overdue
//! but still within the grace window stay, since their execution is either
//! imminent or already running.
//!
//! The cache is a plain `HashMap` owned by the strategy and only touched from
//! the scan loop's thread. Armed tasks report progress through their own
//! [`ScheduledHandle`] and never reach into the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::core::action::ActionFactory;
use crate::core::agent::ScanStrategy;
use crate::core::hook::{HookKey, Site};
use crate::core::timer::{ScheduledHandle, TimerPool};
use crate::util::clock::{delay_until, remaining, Clock, SystemClock};

/// Default period between discovery scans.
pub const DEFAULT_DISCOVERY_PERIOD: Duration = Duration::from_secs(300);

/// Default number of concurrently running hook actions.
pub const DEFAULT_WORKER_SLOTS: usize = 8;

/// Default window past the due time before an armed record is cancelled.
pub const DEFAULT_STALE_GRACE: Duration = Duration::from_secs(120);

const TIMER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// One armed occurrence.
#[derive(Debug)]
pub struct ScheduledRecord {
    handle: ScheduledHandle,
    due: DateTime<Utc>,
    armed_at: DateTime<Utc>,
}

impl ScheduledRecord {
    /// Handle of the armed execution.
    #[must_use]
    pub const fn handle(&self) -> &ScheduledHandle {
        &self.handle
    }

    /// Due time the record was armed for.
    #[must_use]
    pub const fn due(&self) -> DateTime<Utc> {
        self.due
    }

    /// When the record was armed.
    #[must_use]
    pub const fn armed_at(&self) -> DateTime<Utc> {
        self.armed_at
    }
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Records cancelled for being overdue past the grace window.
    pub cancelled: usize,
    /// Records removed from the cache.
    pub removed: usize,
    /// Records still cached afterwards.
    pub retained: usize,
}

/// Timer-driven dispatch with deduplication and stale eviction.
pub struct LowLatencyStrategy {
    factory: Arc<dyn ActionFactory>,
    timers: Option<TimerPool>,
    clock: Arc<dyn Clock>,
    period: Duration,
    grace: TimeDelta,
    scheduled: HashMap<HookKey, ScheduledRecord>,
    next_scan: Instant,
}

impl LowLatencyStrategy {
    /// Create a strategy arming actions on `timers`.
    pub fn new(factory: Arc<dyn ActionFactory>, timers: TimerPool) -> Self {
        Self {
            factory,
            timers: Some(timers),
            clock: Arc::new(SystemClock),
            period: DEFAULT_DISCOVERY_PERIOD,
            grace: grace_delta(DEFAULT_STALE_GRACE),
            scheduled: HashMap::new(),
            next_scan: Instant::now(),
        }
    }

    /// Set the discovery period.
    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Set the stale grace window.
    #[must_use]
    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.grace = grace_delta(grace);
        self
    }

    /// Use `clock` for delay and staleness computations.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of cached records.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.scheduled.len()
    }

    /// Cached record for `key`, if any.
    #[must_use]
    pub fn record(&self, key: &HookKey) -> Option<&ScheduledRecord> {
        self.scheduled.get(key)
    }

    /// Cancel overdue records, then drop cancelled and finished ones.
    pub fn evict(&mut self) -> EvictionReport {
        let now = self.clock.now();
        let grace = self.grace;
        let mut report = EvictionReport::default();

        for (key, record) in &self.scheduled {
            if remaining(record.due, now) < -grace && !record.handle.is_done() {
                warn!(
                    hook = %key,
                    overdue_secs = (now - record.due).num_seconds(),
                    "Cancelling stale scheduled hook"
                );
                record.handle.cancel();
                report.cancelled += 1;
            }
        }

        let before = self.scheduled.len();
        self.scheduled
            .retain(|_, record| !(record.handle.is_cancelled() || record.handle.is_done()));
        report.removed = before - self.scheduled.len();
        report.retained = self.scheduled.len();

        debug!(
            cancelled = report.cancelled,
            removed = report.removed,
            retained = report.retained,
            "Eviction pass complete"
        );
        report
    }
}

fn grace_delta(grace: Duration) -> TimeDelta {
    TimeDelta::from_std(grace).unwrap_or(TimeDelta::MAX)
}

impl ScanStrategy for LowLatencyStrategy {
    fn name(&self) -> &'static str {
        "low-latency"
    }

    fn prepare(&mut self) {
        self.next_scan = Instant::now() + self.period;
    }

    fn dispatch(&mut self, site: &Arc<dyn Site>) {
        let Some(timers) = self.timers.as_ref() else {
            return;
        };

        let hooks = match site.pending_hooks() {
            Ok(hooks) => hooks,
            Err(e) => {
                warn!(site = site.id(), error = %e, "Failed to list pending hooks");
                return;
            }
        };

        for hook in &hooks {
            let key = HookKey::new(site.id(), hook);
            if self.scheduled.contains_key(&key) {
                continue;
            }

            let action = match self.factory.create(site, hook) {
                Ok(action) => action,
                Err(e) => {
                    warn!(hook = %key, error = %e, "Hook dispatch failed");
                    continue;
                }
            };

            let now = self.clock.now();
            let delay = delay_until(hook.due, now);
            debug!(
                hook = %key,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Arming hook"
            );
            let handle = timers.schedule(key.clone(), action, delay);
            self.scheduled.insert(
                key,
                ScheduledRecord {
                    handle,
                    due: hook.due,
                    armed_at: now,
                },
            );
        }
    }

    fn finalize(&mut self) -> Instant {
        self.evict();
        self.next_scan
    }

    fn shutdown(&mut self) {
        for record in self.scheduled.values() {
            record.handle.cancel();
        }
        let dropped = self.scheduled.len();
        self.scheduled.clear();
        if let Some(timers) = self.timers.take() {
            timers.shutdown(TIMER_SHUTDOWN_TIMEOUT);
        }
        info!(dropped = dropped, "Low-latency strategy shut down");
    }
}

impl Drop for LowLatencyStrategy {
    fn drop(&mut self) {
        if let Some(timers) = self.timers.take() {
            timers.shutdown_background();
        }
    }
}

impl std::fmt::Debug for LowLatencyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LowLatencyStrategy")
            .field("period", &self.period)
            .field("grace", &self.grace)
            .field("armed", &self.scheduled.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::ExecutableAction;
    use crate::core::hook::HookOccurrence;
    use crate::core::{AgentError, AppResult};
    use crate::util::clock::ManualClock;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MutableSite {
        hooks: Mutex<Vec<HookOccurrence>>,
    }

    impl Site for MutableSite {
        fn id(&self) -> &str {
            "blog"
        }

        fn pending_hooks(&self) -> AppResult<Vec<HookOccurrence>> {
            Ok(self.hooks.lock().clone())
        }
    }

    fn counting_factory(count: &Arc<AtomicUsize>) -> Arc<dyn ActionFactory> {
        let count = Arc::clone(count);
        Arc::new(
            move |_: &Arc<dyn Site>,
                  _: &HookOccurrence|
                  -> Result<Box<dyn ExecutableAction>, AgentError> {
                let count = Arc::clone(&count);
                Ok(Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }))
            },
        )
    }

    fn wait_for(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_rescans_do_not_rearm() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let runs = Arc::new(AtomicUsize::new(0));
        let mut strategy = LowLatencyStrategy::new(counting_factory(&runs), TimerPool::new(2).unwrap())
            .with_clock(clock.clone());

        let due = now + TimeDelta::hours(1);
        let site = Arc::new(MutableSite {
            hooks: Mutex::new(vec![HookOccurrence::new("publish", due)]),
        });
        let site_dyn: Arc<dyn Site> = site.clone();

        for second in [0, 15, 42] {
            *site.hooks.lock() = vec![HookOccurrence::new(
                "publish",
                due + TimeDelta::seconds(second),
            )];
            strategy.prepare();
            strategy.dispatch(&site_dyn);
            strategy.finalize();
        }

        assert_eq!(strategy.armed_count(), 1);
        let key = HookKey::new("blog", &HookOccurrence::new("publish", due));
        assert_eq!(strategy.record(&key).unwrap().due(), due);
        strategy.shutdown();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_overdue_hook_fires_and_is_evicted() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let runs = Arc::new(AtomicUsize::new(0));
        let mut strategy = LowLatencyStrategy::new(counting_factory(&runs), TimerPool::new(2).unwrap())
            .with_clock(clock.clone());

        let site: Arc<dyn Site> = Arc::new(MutableSite {
            hooks: Mutex::new(vec![HookOccurrence::new(
                "late",
                now - TimeDelta::minutes(10),
            )]),
        });

        strategy.prepare();
        strategy.dispatch(&site);
        let key = HookKey::new("blog", &HookOccurrence::new("late", now - TimeDelta::minutes(10)));
        wait_for(|| strategy.record(&key).is_some_and(|r| r.handle().is_done()));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let report = strategy.evict();
        assert_eq!(report.removed, 1);
        assert_eq!(strategy.armed_count(), 0);
        strategy.shutdown();
    }

    #[test]
    fn test_stale_record_cancelled_beyond_grace() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let runs = Arc::new(AtomicUsize::new(0));
        let mut strategy = LowLatencyStrategy::new(counting_factory(&runs), TimerPool::new(1).unwrap())
            .with_clock(clock.clone());

        let due = now + TimeDelta::minutes(30);
        let site: Arc<dyn Site> = Arc::new(MutableSite {
            hooks: Mutex::new(vec![HookOccurrence::new("stuck", due)]),
        });
        strategy.prepare();
        strategy.dispatch(&site);

        // Overdue but within grace: kept.
        clock.set(due + TimeDelta::seconds(119));
        let report = strategy.evict();
        assert_eq!(report, EvictionReport { cancelled: 0, removed: 0, retained: 1 });

        clock.set(due + TimeDelta::seconds(121));
        let report = strategy.evict();
        assert_eq!(report, EvictionReport { cancelled: 1, removed: 1, retained: 0 });
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        strategy.shutdown();
    }

    #[test]
    fn test_evicted_occurrence_can_be_rearmed() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let runs = Arc::new(AtomicUsize::new(0));
        let mut strategy = LowLatencyStrategy::new(counting_factory(&runs), TimerPool::new(1).unwrap())
            .with_clock(clock.clone());

        let site: Arc<dyn Site> = Arc::new(MutableSite {
            hooks: Mutex::new(vec![HookOccurrence::new("retry", now)]),
        });
        let key = HookKey::new("blog", &HookOccurrence::new("retry", now));

        strategy.prepare();
        strategy.dispatch(&site);
        wait_for(|| strategy.record(&key).is_some_and(|r| r.handle().is_done()));
        strategy.finalize();
        assert_eq!(strategy.armed_count(), 0);

        strategy.prepare();
        strategy.dispatch(&site);
        wait_for(|| runs.load(Ordering::SeqCst) == 2);
        strategy.shutdown();
    }

    #[test]
    fn test_stale_queued_hook_runs_once_after_rearm() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let runs = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);

        let counter = Arc::clone(&runs);
        let factory = move |_: &Arc<dyn Site>,
                            hook: &HookOccurrence|
              -> Result<Box<dyn ExecutableAction>, AgentError> {
            if hook.name == "busy" {
                let release = release_rx.clone();
                return Ok(Box::new(move || {
                    let _ = release.recv();
                }));
            }
            let counter = Arc::clone(&counter);
            Ok(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
        };
        let mut strategy = LowLatencyStrategy::new(Arc::new(factory), TimerPool::new(1).unwrap())
            .with_clock(clock.clone());

        let site: Arc<dyn Site> = Arc::new(MutableSite {
            hooks: Mutex::new(vec![
                HookOccurrence::new("busy", now),
                HookOccurrence::new("publish", now),
            ]),
        });
        let busy = HookKey::new("blog", &HookOccurrence::new("busy", now));
        let publish = HookKey::new("blog", &HookOccurrence::new("publish", now));

        strategy.prepare();
        strategy.dispatch(&site);
        wait_for(|| strategy.record(&busy).is_some_and(|r| r.handle().is_running()));
        std::thread::sleep(Duration::from_millis(50));
        assert!(!strategy.record(&publish).unwrap().handle().is_running());

        // Both records go stale while the only slot is held.
        clock.set(now + TimeDelta::seconds(200));
        strategy.finalize();
        assert_eq!(strategy.armed_count(), 0);

        strategy.prepare();
        strategy.dispatch(&site);
        drop(release_tx);
        wait_for(|| runs.load(Ordering::SeqCst) == 1);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        strategy.shutdown();
    }

    #[test]
    fn test_factory_failure_skips_only_that_hook() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap();
        let factory = |_: &Arc<dyn Site>,
                       hook: &HookOccurrence|
         -> Result<Box<dyn ExecutableAction>, AgentError> {
            if hook.name == "bad" {
                return Err(AgentError::Dispatch {
                    site: "blog".into(),
                    hook: hook.name.clone(),
                    reason: "no handler".into(),
                });
            }
            Ok(Box::new(|| {}))
        };
        let mut strategy = LowLatencyStrategy::new(Arc::new(factory), TimerPool::new(1).unwrap())
            .with_clock(Arc::new(ManualClock::new(now)));

        let site: Arc<dyn Site> = Arc::new(MutableSite {
            hooks: Mutex::new(vec![
                HookOccurrence::new("bad", now + TimeDelta::hours(1)),
                HookOccurrence::new("good", now + TimeDelta::hours(1)),
            ]),
        });
        strategy.prepare();
        strategy.dispatch(&site);
        assert_eq!(strategy.armed_count(), 1);
        strategy.shutdown();
    }
}
