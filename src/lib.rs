//! # Hook Agent
//!
//! An always-on agent that discovers pending scheduled work items ("hooks")
//! across a set of managed sites and runs each due hook as an external process.
//!
//! ## Core Problem Solved
//!
//! Sites own hooks that become due at wall-clock times. Something has to notice
//! them, run each exactly once, and run it close to its due time, without a
//! stuck subprocess or a flood of output wedging the agent:
//!
//! - **Deduplication**: Repeated scans of the same site must not schedule the same
//!   occurrence twice
//! - **Latency**: A hook should fire at its due minute, not whenever the next scan
//!   happens to come round
//! - **Isolation**: One failing hook must never stop the others
//! - **Pipe safety**: Child output is drained concurrently so a child never blocks
//!   on a full pipe
//!
//! ## Key Features
//!
//! - **Scan engine**: [`core::ScanAgent`] drives a prepare → dispatch → finalize →
//!   idle loop over any [`core::ScanStrategy`]
//! - **Round-robin strategy**: Rescan on a fixed period, run waiting hooks at once
//! - **Low-latency strategy**: Discover on a coarse period, run each hook on its own
//!   timer, with a deduplicating cache and stale-entry eviction
//! - **Process launcher**: [`process::Command`] with pluggable output drains
//!   (raw bytes, incremental text, lines)
//! - **Configuration**: JSON or `HOOK_AGENT_*` environment variables
//!
//! ## Running an agent
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use hook_agent::builders::build_command_agent;
//! use hook_agent::config::AgentConfig;
//! use hook_agent::infra::{StaticSite, StaticSiteSource};
//! use hook_agent::runtime::spawn_agent;
//!
//! hook_agent::util::init_tracing();
//!
//! let cfg = AgentConfig::from_env()?;
//! let sites = StaticSiteSource::new();
//! sites.add(Arc::new(StaticSite::new("blog").with_hook("publish_future", chrono::Utc::now())));
//!
//! let agent = build_command_agent(&cfg, Arc::new(sites))?;
//! let handle = spawn_agent(agent)?;
//! // ...
//! let _ = handle.shutdown(Duration::from_secs(5));
//! ```
//!
//! ## Running a command directly
//!
//! ```rust,ignore
//! use hook_agent::process::{Command, TextDrain};
//!
//! let completed = Command::new("echo", TextDrain::new())
//!     .arg("hello world")
//!     .start()?
//!     .wait_for_completion()?;
//! assert_eq!(completed.output().text(), "hello world\n");
//! ```
//!
//! For complete examples, see:
//! - `tests/scan_agent_test.rs` - Scan loop and strategy integration tests
//! - `tests/command_test.rs` - Process launcher and drain tests

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: hooks, actions, scan loop and strategies.
pub mod core;
/// Configuration models for the agent and its pools.
pub mod config;
/// Builders to construct agents from configuration.
pub mod builders;
/// Infrastructure adapters for site inventories.
pub mod infra;
/// Process launcher and output drains.
pub mod process;
/// Runtime adapters for running agents on dedicated threads.
pub mod runtime;
/// Shared utilities.
pub mod util;
