//! Process launcher: argument vector building, spawn and completion wait.
//!
//! ```rust,ignore
//! use hook_agent::process::{Command, LineDrain};
//!
//! let completed = Command::new("wp", LineDrain::new())
//!     .arg("cron")
//!     .args(["event", "run", "my_hook"])
//!     .arg(std::path::Path::new("site"))
//!     .start()?
//!     .wait_for_completion()?;
//!
//! println!("{} -> {:?}", completed.output().joined(), completed.exit_code());
//! ```
//!
//! [`Command::start`] consumes the command and [`Execution::wait_for_completion`]
//! consumes the execution, so the argument vector cannot change after launch
//! and an execution can only be waited on once.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ExitStatus, Stdio};

use tracing::{debug, warn};

use crate::core::AgentError;

use super::drain::{spawn_drain, DrainStatus, DrainWaiter, OutputDrain};

/// One argument literal. Paths are made absolute when appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Text passed through verbatim.
    Text(String),
    /// Filesystem path, normalized to its absolute form.
    Path(PathBuf),
}

impl Argument {
    /// Render the argument as it will appear in the argv.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Path(path) => {
                let absolute = std::path::absolute(&path).unwrap_or(path);
                absolute.to_string_lossy().into_owned()
            }
        }
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Argument {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<&Path> for Argument {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for Argument {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&PathBuf> for Argument {
    fn from(value: &PathBuf) -> Self {
        Self::Path(value.clone())
    }
}

macro_rules! argument_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Self::Text(value.to_string())
                }
            }
        )*
    };
}

argument_from_number!(i32, i64, u16, u32, u64, usize);

/// Where the child's standard error goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrMode {
    /// Share the agent's stderr.
    #[default]
    Inherit,
    /// Discard it.
    Discard,
}

/// Command specification with an attached output drain.
///
/// `argv[0]` is always the executable; [`Command::executable`] overwrites that
/// slot instead of appending.
pub struct Command<D: OutputDrain> {
    argv: Vec<String>,
    drain: D,
    stderr: StderrMode,
    current_dir: Option<PathBuf>,
}

impl<D: OutputDrain> Command<D> {
    /// Create a command for `program` with no arguments.
    pub fn new(program: impl Into<Argument>, drain: D) -> Self {
        Self {
            argv: vec![program.into().into_text()],
            drain,
            stderr: StderrMode::default(),
            current_dir: None,
        }
    }

    /// Create a command for `program` with an initial argument list.
    pub fn with_args<I, A>(program: impl Into<Argument>, args: I, drain: D) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        Self::new(program, drain).args(args)
    }

    /// Replace the executable (argv slot 0).
    #[must_use]
    pub fn executable(mut self, program: impl Into<Argument>) -> Self {
        self.argv[0] = program.into().into_text();
        self
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.argv.push(arg.into().into_text());
        self
    }

    /// Append arguments in iteration order.
    #[must_use]
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        self.argv
            .extend(args.into_iter().map(|arg| arg.into().into_text()));
        self
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Discard the child's standard error instead of inheriting it.
    #[must_use]
    pub const fn discard_stderr(mut self) -> Self {
        self.stderr = StderrMode::Discard;
        self
    }

    /// The executable.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Full argument vector, executable first.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Launch the process and start draining its standard output.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Launch` if the OS refuses to create the process or
    /// the drain thread cannot be started.
    pub fn start(self) -> Result<Execution<D>, AgentError> {
        let rendered = self.to_string();
        let program = self.argv[0].clone();

        let mut std_cmd = std::process::Command::new(OsStr::new(&program));
        std_cmd
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(match self.stderr {
                StderrMode::Inherit => Stdio::inherit(),
                StderrMode::Discard => Stdio::null(),
            });
        if let Some(dir) = &self.current_dir {
            std_cmd.current_dir(dir);
        }

        let mut child = std_cmd.spawn().map_err(|source| AgentError::Launch {
            program: program.clone(),
            source,
        })?;
        let pid = child.id();

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AgentError::Launch {
                program,
                source: std::io::Error::other("child stdout was not captured"),
            });
        };

        let waiter = match spawn_drain(stdout, self.drain, format!("drain-{pid}")) {
            Ok(waiter) => waiter,
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AgentError::Launch { program, source });
            }
        };

        debug!(pid = pid, command = %rendered, "Process started");

        Ok(Execution {
            stdin: child.stdin.take(),
            child,
            waiter,
            rendered,
        })
    }
}

impl<D: OutputDrain> fmt::Display for Command<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_argv(&self.argv))
    }
}

impl<D: OutputDrain> fmt::Debug for Command<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("argv", &self.argv)
            .field("stderr", &self.stderr)
            .field("current_dir", &self.current_dir)
            .finish_non_exhaustive()
    }
}

/// Shell-style rendering: arguments containing whitespace are wrapped in
/// double quotes, the rest are bare, joined with single spaces.
#[must_use]
pub fn render_argv<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            if arg.chars().any(char::is_whitespace) {
                format!("\"{arg}\"")
            } else {
                arg.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A running process with its drain attached.
pub struct Execution<D: OutputDrain> {
    child: Child,
    stdin: Option<ChildStdin>,
    waiter: DrainWaiter<D>,
    rendered: String,
}

impl<D: OutputDrain> Execution<D> {
    /// OS process id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// The child's standard input, until it is closed.
    pub fn stdin(&mut self) -> Option<&mut ChildStdin> {
        self.stdin.as_mut()
    }

    /// Close standard input so the child sees end-of-file.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Best-effort kill of the child.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the signal could not be delivered.
    pub fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill()
    }

    /// Block until the process has exited and the drain has consumed all of
    /// its output, then return the exit status with the captured output.
    ///
    /// Standard input is closed first.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Interrupted` if the OS wait fails or the drain
    /// thread dies without signalling.
    pub fn wait_for_completion(mut self) -> Result<Completed<D>, AgentError> {
        self.close_stdin();
        let status = self
            .child
            .wait()
            .map_err(|e| AgentError::Interrupted(format!("waiting on `{}`: {e}", self.rendered)))?;
        let captured = self.waiter.wait()?;

        if let DrainStatus::Faulted(fault) = &captured.status {
            warn!(command = %self.rendered, error = %fault, "Output capture incomplete");
        }
        debug!(command = %self.rendered, exit_code = ?status.code(), "Process completed");

        Ok(Completed {
            status,
            output: captured.drain,
            drain_status: captured.status,
        })
    }
}

impl<D: OutputDrain> fmt::Debug for Execution<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("pid", &self.child.id())
            .field("command", &self.rendered)
            .finish_non_exhaustive()
    }
}

/// Outcome of a finished execution.
#[derive(Debug)]
pub struct Completed<D> {
    status: ExitStatus,
    output: D,
    drain_status: DrainStatus,
}

impl<D> Completed<D> {
    /// Process exit code; `None` when terminated by a signal.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Raw OS exit status.
    #[must_use]
    pub const fn status(&self) -> ExitStatus {
        self.status
    }

    /// Captured output.
    #[must_use]
    pub const fn output(&self) -> &D {
        &self.output
    }

    /// Take the captured output.
    #[must_use]
    pub fn into_output(self) -> D {
        self.output
    }

    /// How output capture ended. Never affects [`Completed::success`].
    #[must_use]
    pub const fn drain_status(&self) -> &DrainStatus {
        &self.drain_status
    }
}
