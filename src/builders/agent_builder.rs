//! Builders to construct scan agents from configuration.

use std::sync::Arc;

use crate::config::{AgentConfig, StrategyKind};
use crate::core::{
    ActionFactory, ActionPool, AgentError, CommandActionFactory, LowLatencyStrategy,
    RoundRobinStrategy, ScanAgent, ScanStrategy, SiteSource, TimerPool,
};
use crate::util::clock::Clock;

/// Build the configured strategy around `factory`.
///
/// # Errors
///
/// Returns `AgentError::InvalidConfig` for an invalid configuration and
/// `AgentError::Runtime` if the strategy's workers cannot be started.
pub fn build_strategy(
    cfg: &AgentConfig,
    factory: Arc<dyn ActionFactory>,
    clock: Option<Arc<dyn Clock>>,
) -> Result<Box<dyn ScanStrategy>, AgentError> {
    cfg.validate().map_err(AgentError::InvalidConfig)?;

    let strategy: Box<dyn ScanStrategy> = match cfg.strategy {
        StrategyKind::RoundRobin => {
            let pool = ActionPool::new(cfg.dispatch_pool())?;
            let mut strategy = RoundRobinStrategy::new(factory, pool).with_period(cfg.scan_period());
            if let Some(clock) = clock {
                strategy = strategy.with_clock(clock);
            }
            Box::new(strategy)
        }
        StrategyKind::LowLatency => {
            let timers = TimerPool::new(cfg.timer_pool_size)?;
            let mut strategy = LowLatencyStrategy::new(factory, timers)
                .with_period(cfg.scan_period())
                .with_stale_grace(cfg.stale_grace());
            if let Some(clock) = clock {
                strategy = strategy.with_clock(clock);
            }
            Box::new(strategy)
        }
    };

    Ok(strategy)
}

/// Build an agent scanning `sites` with the configured strategy and factory.
///
/// # Errors
///
/// See [`build_strategy`].
pub fn build_agent(
    cfg: &AgentConfig,
    sites: Arc<dyn SiteSource>,
    factory: Arc<dyn ActionFactory>,
) -> Result<ScanAgent<Box<dyn ScanStrategy>>, AgentError> {
    let strategy = build_strategy(cfg, factory, None)?;
    Ok(ScanAgent::new(strategy, sites))
}

/// Build an agent whose actions run the configured command template.
///
/// # Errors
///
/// Returns `AgentError::InvalidConfig` when no `action` is configured, plus
/// everything [`build_strategy`] can return.
pub fn build_command_agent(
    cfg: &AgentConfig,
    sites: Arc<dyn SiteSource>,
) -> Result<ScanAgent<Box<dyn ScanStrategy>>, AgentError> {
    let template = cfg
        .action
        .clone()
        .ok_or_else(|| AgentError::InvalidConfig("no action command configured".into()))?;
    let factory = CommandActionFactory::new(template)?;
    build_agent(cfg, sites, Arc::new(factory))
}
