//! Agent configuration: strategy selection, timing knobs and the hook command.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::pool::{ActionPoolConfig, DEFAULT_QUEUE_DEPTH};
use crate::core::CommandTemplate;

/// Prefix of every environment variable read by [`AgentConfig::from_env`].
pub const ENV_PREFIX: &str = "HOOK_AGENT_";

/// Scheduling strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Rescan on a fixed period and run waiting hooks immediately.
    RoundRobin,
    /// Discover on a coarse period, run each hook on its own timer.
    #[default]
    LowLatency,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" => Ok(Self::RoundRobin),
            "low_latency" => Ok(Self::LowLatency),
            other => Err(format!("unknown strategy `{other}`")),
        }
    }
}

const fn default_scan_period_secs() -> u64 {
    300
}

const fn default_timer_pool_size() -> usize {
    8
}

const fn default_stale_grace_secs() -> u64 {
    120
}

fn default_dispatch_workers() -> usize {
    num_cpus::get().max(1)
}

const fn default_dispatch_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

/// Root agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Which strategy drives the scan loop.
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Seconds between scans (discovery scans for the low-latency strategy).
    #[serde(default = "default_scan_period_secs")]
    pub scan_period_secs: u64,
    /// Concurrent hook executions for the low-latency timer pool.
    #[serde(default = "default_timer_pool_size")]
    pub timer_pool_size: usize,
    /// Seconds past due before an armed hook is cancelled as stale.
    #[serde(default = "default_stale_grace_secs")]
    pub stale_grace_secs: u64,
    /// Worker threads for round-robin dispatch.
    #[serde(default = "default_dispatch_workers")]
    pub dispatch_workers: usize,
    /// Queue depth for round-robin dispatch.
    #[serde(default = "default_dispatch_queue_depth")]
    pub dispatch_queue_depth: usize,
    /// Command run for each due hook.
    #[serde(default)]
    pub action: Option<CommandTemplate>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            scan_period_secs: default_scan_period_secs(),
            timer_pool_size: default_timer_pool_size(),
            stale_grace_secs: default_stale_grace_secs(),
            dispatch_workers: default_dispatch_workers(),
            dispatch_queue_depth: default_dispatch_queue_depth(),
            action: None,
        }
    }
}

impl AgentConfig {
    /// Configuration with every default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the scan period in seconds.
    #[must_use]
    pub const fn with_scan_period_secs(mut self, secs: u64) -> Self {
        self.scan_period_secs = secs;
        self
    }

    /// Set the timer pool size.
    #[must_use]
    pub const fn with_timer_pool_size(mut self, size: usize) -> Self {
        self.timer_pool_size = size;
        self
    }

    /// Set the stale grace window in seconds.
    #[must_use]
    pub const fn with_stale_grace_secs(mut self, secs: u64) -> Self {
        self.stale_grace_secs = secs;
        self
    }

    /// Set the round-robin worker count.
    #[must_use]
    pub const fn with_dispatch_workers(mut self, workers: usize) -> Self {
        self.dispatch_workers = workers;
        self
    }

    /// Set the hook command.
    #[must_use]
    pub fn with_action(mut self, action: CommandTemplate) -> Self {
        self.action = Some(action);
        self
    }

    /// Scan period as a duration.
    #[must_use]
    pub const fn scan_period(&self) -> Duration {
        Duration::from_secs(self.scan_period_secs)
    }

    /// Stale grace window as a duration.
    #[must_use]
    pub const fn stale_grace(&self) -> Duration {
        Duration::from_secs(self.stale_grace_secs)
    }

    /// Pool configuration for round-robin dispatch.
    #[must_use]
    pub fn dispatch_pool(&self) -> ActionPoolConfig {
        ActionPoolConfig::new()
            .with_worker_count(self.dispatch_workers)
            .with_max_queue_depth(self.dispatch_queue_depth)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.scan_period_secs == 0 {
            return Err("scan_period_secs must be greater than 0".into());
        }
        if self.timer_pool_size == 0 {
            return Err("timer_pool_size must be greater than 0".into());
        }
        if self.stale_grace_secs == 0 {
            return Err("stale_grace_secs must be greater than 0".into());
        }
        self.dispatch_pool()
            .validate()
            .map_err(|e| format!("dispatch pool invalid: {e}"))?;
        if let Some(action) = &self.action {
            action.validate()?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `HOOK_AGENT_*` environment variables, loading
    /// a `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// `HOOK_AGENT_ACTION` is a whitespace-separated command line; arguments
    /// cannot contain spaces.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));
        let mut cfg = Self::default();

        if let Some(value) = get("STRATEGY") {
            cfg.strategy = value.parse()?;
        }
        if let Some(value) = get("SCAN_PERIOD_SECS") {
            cfg.scan_period_secs = parse_number("SCAN_PERIOD_SECS", &value)?;
        }
        if let Some(value) = get("TIMER_POOL_SIZE") {
            cfg.timer_pool_size = parse_number("TIMER_POOL_SIZE", &value)?;
        }
        if let Some(value) = get("STALE_GRACE_SECS") {
            cfg.stale_grace_secs = parse_number("STALE_GRACE_SECS", &value)?;
        }
        if let Some(value) = get("DISPATCH_WORKERS") {
            cfg.dispatch_workers = parse_number("DISPATCH_WORKERS", &value)?;
        }
        if let Some(value) = get("DISPATCH_QUEUE_DEPTH") {
            cfg.dispatch_queue_depth = parse_number("DISPATCH_QUEUE_DEPTH", &value)?;
        }
        if let Some(value) = get("ACTION") {
            let mut parts = value.split_whitespace();
            let program = parts
                .next()
                .ok_or_else(|| format!("{ENV_PREFIX}ACTION must not be empty"))?;
            cfg.action = Some(CommandTemplate::new(program, parts));
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{key}: {e}"))
}
