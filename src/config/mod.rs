//! Configuration models for the agent and its worker pools.

pub mod agent;
pub mod pool;

pub use agent::{AgentConfig, StrategyKind, ENV_PREFIX};
pub use pool::ActionPoolConfig;
