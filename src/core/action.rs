//! Executable actions and the factories that bind them to hook occurrences.
//!
//! The scan engine never looks inside an action: it asks an [`ActionFactory`]
//! for one, fires it, and forgets it. Actions report their own failures.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::hook::{HookOccurrence, Site};
use crate::core::AgentError;
use crate::process::{Command, LineDrain};

/// A unit of work bound to one hook occurrence on one site.
pub trait ExecutableAction: Send + 'static {
    /// Run the action to completion. Failures are reported by the action.
    fn run(&self);
}

impl<F> ExecutableAction for F
where
    F: Fn() + Send + 'static,
{
    fn run(&self) {
        self();
    }
}

/// Builds the action for a (site, hook) pair.
pub trait ActionFactory: Send + Sync {
    /// Create the action that executes `hook` on `site`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Dispatch` when no action can be built.
    fn create(
        &self,
        site: &Arc<dyn Site>,
        hook: &HookOccurrence,
    ) -> Result<Box<dyn ExecutableAction>, AgentError>;
}

impl<F> ActionFactory for F
where
    F: Fn(&Arc<dyn Site>, &HookOccurrence) -> Result<Box<dyn ExecutableAction>, AgentError>
        + Send
        + Sync,
{
    fn create(
        &self,
        site: &Arc<dyn Site>,
        hook: &HookOccurrence,
    ) -> Result<Box<dyn ExecutableAction>, AgentError> {
        self(site, hook)
    }
}

/// Run an action, containing any panic so it cannot take down the caller.
///
/// Returns `false` if the action panicked.
pub fn run_isolated(action: &dyn ExecutableAction) -> bool {
    match catch_unwind(AssertUnwindSafe(|| action.run())) {
        Ok(()) => true,
        Err(panic) => {
            error!(reason = %panic_message(panic.as_ref()), "Hook action panicked");
            false
        }
    }
}

/// Readable text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".into())
}

/// Command line template for running a hook.
///
/// `{site}`, `{hook}` and `{due}` (RFC 3339) are substituted in the program
/// and in every argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    /// Executable path or name resolvable through `PATH`.
    pub program: String,
    /// Arguments, in argv order.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Create a template.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate the template.
    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("action program must not be empty".into());
        }
        Ok(())
    }

    /// Substitute placeholders for one occurrence, executable first.
    #[must_use]
    pub fn render(&self, site: &str, hook: &HookOccurrence) -> Vec<String> {
        let due = hook.due.to_rfc3339();
        let fill = |text: &str| {
            text.replace("{site}", site)
                .replace("{hook}", &hook.name)
                .replace("{due}", &due)
        };
        std::iter::once(fill(&self.program))
            .chain(self.args.iter().map(|arg| fill(arg)))
            .collect()
    }
}

/// Runs one templated command for one hook occurrence.
#[derive(Debug, Clone)]
pub struct CommandAction {
    site: String,
    hook: String,
    argv: Vec<String>,
}

impl CommandAction {
    /// Argument vector the action will launch.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl ExecutableAction for CommandAction {
    fn run(&self) {
        let execution_id = Uuid::new_v4();
        let Some((program, args)) = self.argv.split_first() else {
            return;
        };

        let started = match Command::with_args(program, args, LineDrain::new()).start() {
            Ok(execution) => execution,
            Err(e) => {
                error!(
                    %execution_id,
                    site = %self.site,
                    hook = %self.hook,
                    error = %e,
                    "Failed to launch hook command"
                );
                return;
            }
        };

        match started.wait_for_completion() {
            Ok(completed) => {
                for line in completed.output().lines() {
                    debug!(%execution_id, hook = %self.hook, output = %line);
                }
                if completed.success() {
                    info!(
                        %execution_id,
                        site = %self.site,
                        hook = %self.hook,
                        "Hook executed"
                    );
                } else {
                    warn!(
                        %execution_id,
                        site = %self.site,
                        hook = %self.hook,
                        exit_code = ?completed.exit_code(),
                        output = %completed.output().joined(),
                        "Hook command exited unsuccessfully"
                    );
                }
            }
            Err(e) => {
                warn!(
                    %execution_id,
                    site = %self.site,
                    hook = %self.hook,
                    error = %e,
                    "Hook command wait failed"
                );
            }
        }
    }
}

/// Factory producing a [`CommandAction`] from a [`CommandTemplate`].
#[derive(Debug, Clone)]
pub struct CommandActionFactory {
    template: CommandTemplate,
}

impl CommandActionFactory {
    /// Create a factory for `template`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::InvalidConfig` if the template is invalid.
    pub fn new(template: CommandTemplate) -> Result<Self, AgentError> {
        template.validate().map_err(AgentError::InvalidConfig)?;
        Ok(Self { template })
    }

    /// Build the concrete action without boxing.
    #[must_use]
    pub fn command_for(&self, site: &str, hook: &HookOccurrence) -> CommandAction {
        CommandAction {
            site: site.to_owned(),
            hook: hook.name.clone(),
            argv: self.template.render(site, hook),
        }
    }
}

impl ActionFactory for CommandActionFactory {
    fn create(
        &self,
        site: &Arc<dyn Site>,
        hook: &HookOccurrence,
    ) -> Result<Box<dyn ExecutableAction>, AgentError> {
        let action = self.command_for(site.id(), hook);
        if action.argv.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(AgentError::Dispatch {
                site: site.id().to_owned(),
                hook: hook.name.clone(),
                reason: "command template rendered an empty program".into(),
            });
        }
        Ok(Box::new(action))
    }
}
