//! Tests for configuration validation

use std::time::Duration;

use hook_agent::config::{ActionPoolConfig, AgentConfig, StrategyKind};
use hook_agent::core::CommandTemplate;

#[test]
fn test_pool_config_validation() {
    let valid = ActionPoolConfig::new().with_worker_count(4).with_max_queue_depth(16);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_pool_config_invalid_worker_count() {
    let invalid = ActionPoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_pool_config_invalid_queue_depth() {
    let invalid = ActionPoolConfig::new().with_max_queue_depth(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_agent_config_invalid_values() {
    assert!(AgentConfig::new().with_scan_period_secs(0).validate().is_err());
    assert!(AgentConfig::new().with_timer_pool_size(0).validate().is_err());
    assert!(AgentConfig::new().with_stale_grace_secs(0).validate().is_err());
    assert!(AgentConfig::new().with_dispatch_workers(0).validate().is_err());
    assert!(AgentConfig::new()
        .with_action(CommandTemplate::new("  ", Vec::<String>::new()))
        .validate()
        .is_err());
}

#[test]
fn test_agent_config_from_json() {
    let json = r#"
    {
        "strategy": "low_latency",
        "scan_period_secs": 600,
        "timer_pool_size": 4,
        "stale_grace_secs": 60,
        "action": {
            "program": "wp",
            "args": ["cron", "event", "run", "{hook}", "--url={site}"]
        }
    }
    "#;

    let cfg = AgentConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.strategy, StrategyKind::LowLatency);
    assert_eq!(cfg.scan_period(), Duration::from_secs(600));
    assert_eq!(cfg.timer_pool_size, 4);
    assert_eq!(cfg.stale_grace(), Duration::from_secs(60));
    assert_eq!(cfg.action.unwrap().program, "wp");
}

#[test]
fn test_agent_config_json_defaults() {
    let cfg = AgentConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, AgentConfig::default());
}

#[test]
fn test_agent_config_json_rejects_invalid() {
    assert!(AgentConfig::from_json_str(r#"{"scan_period_secs": 0}"#).is_err());
    assert!(AgentConfig::from_json_str(r#"{"strategy": "sometimes"}"#).is_err());
    assert!(AgentConfig::from_json_str("not json").is_err());
}

#[test]
fn test_strategy_kind_parse() {
    assert_eq!("round_robin".parse(), Ok(StrategyKind::RoundRobin));
    assert_eq!("Low-Latency".parse(), Ok(StrategyKind::LowLatency));
    assert!("fastest".parse::<StrategyKind>().is_err());
}

#[test]
fn test_dispatch_pool_follows_agent_config() {
    let cfg = AgentConfig::new().with_dispatch_workers(3);
    let pool = cfg.dispatch_pool();
    assert_eq!(pool.worker_count, 3);
    assert_eq!(pool.max_queue_depth, cfg.dispatch_queue_depth);
}
