//! Tests for agent builders

use std::sync::Arc;

use hook_agent::builders::{build_command_agent, build_strategy};
use hook_agent::config::{AgentConfig, StrategyKind};
use hook_agent::core::{
    ActionFactory, AgentError, CommandTemplate, ExecutableAction, HookOccurrence, ScanStrategy,
    Site,
};
use hook_agent::infra::StaticSiteSource;

fn noop_factory() -> Arc<dyn ActionFactory> {
    Arc::new(
        |_: &Arc<dyn Site>, _: &HookOccurrence| -> Result<Box<dyn ExecutableAction>, AgentError> {
            Ok(Box::new(|| {}))
        },
    )
}

#[test]
fn test_build_each_strategy() {
    for (kind, name) in [
        (StrategyKind::RoundRobin, "round-robin"),
        (StrategyKind::LowLatency, "low-latency"),
    ] {
        let cfg = AgentConfig::new()
            .with_strategy(kind)
            .with_dispatch_workers(1)
            .with_timer_pool_size(1);
        let mut strategy = build_strategy(&cfg, noop_factory(), None).unwrap();
        assert_eq!(strategy.name(), name);
        strategy.shutdown();
    }
}

#[test]
fn test_command_agent_requires_action() {
    let cfg = AgentConfig::new();
    let err = build_command_agent(&cfg, Arc::new(StaticSiteSource::new())).unwrap_err();
    assert!(matches!(err, AgentError::InvalidConfig(_)));
}

#[test]
fn test_command_agent_with_action() {
    let cfg = AgentConfig::new()
        .with_strategy(StrategyKind::LowLatency)
        .with_timer_pool_size(2)
        .with_action(CommandTemplate::new("wp", ["cron", "event", "run", "{hook}"]));
    let mut agent = build_command_agent(&cfg, Arc::new(StaticSiteSource::new())).unwrap();

    let report = agent.run_cycle();
    assert_eq!(report.sites, 0);
    assert_eq!(agent.cycles(), 1);
    agent.strategy_mut().shutdown();
}
