//! Process launcher and output drains.

pub mod command;
pub mod drain;

pub use command::{render_argv, Argument, Command, Completed, Execution, StderrMode};
pub use drain::{
    drain_stream, spawn_drain, Captured, DrainFault, DrainStatus, DrainWaiter, LineDrain,
    OutputDrain, RawDrain, TextDrain,
};
