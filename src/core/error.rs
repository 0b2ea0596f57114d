//! Error types for agent operations.

use thiserror::Error;

/// Errors produced by the scan engine, its strategies and the process launcher.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The OS refused to start a process (missing executable, permission denied).
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        /// Executable that could not be started.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// An idle wait or a completion wait was interrupted.
    #[error("wait interrupted: {0}")]
    Interrupted(String),
    /// A single hook could not be turned into a running action.
    #[error("dispatch failed for hook `{hook}` on site `{site}`: {reason}")]
    Dispatch {
        /// Site the hook belongs to.
        site: String,
        /// Hook name.
        hook: String,
        /// Human-readable cause.
        reason: String,
    },
    /// A bounded queue refused more work.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread or async runtime could not be created.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl AgentError {
    /// Whether this error is the forced-shutdown signal of a wait.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
