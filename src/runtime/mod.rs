//! Runtime adapters: running a scan agent on its own thread.

pub mod agent_thread;

pub use agent_thread::{spawn_agent, AgentHandle, AgentOutcome};
