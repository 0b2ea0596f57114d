//! Builders to construct agents and strategies from configuration.

pub mod agent_builder;

pub use agent_builder::{build_agent, build_command_agent, build_strategy};
