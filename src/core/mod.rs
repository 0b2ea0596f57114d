//! Core scheduling abstractions: hooks, actions, the scan loop and its strategies.

pub mod action;
pub mod action_pool;
pub mod agent;
pub mod error;
pub mod hook;
pub mod low_latency;
pub mod round_robin;
pub mod timer;

pub use action::{
    run_isolated, ActionFactory, CommandAction, CommandActionFactory, CommandTemplate,
    ExecutableAction,
};
pub use action_pool::{ActionPool, PoolStats};
pub use agent::{idle_duration, AgentState, CycleReport, ScanAgent, ScanStrategy, ShutdownTrigger};
pub use error::{AgentError, AppResult};
pub use hook::{HookKey, HookOccurrence, Site, SiteSource};
pub use low_latency::{EvictionReport, LowLatencyStrategy, ScheduledRecord};
pub use round_robin::RoundRobinStrategy;
pub use timer::{ScheduledHandle, TimerPool};
