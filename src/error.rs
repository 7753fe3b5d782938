//! Error types for cmdrun.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::execution::{ContextError, ExecState};

/// Main error type for command execution.
#[derive(Error, Debug)]
pub enum CmdError {
    /// The working directory does not exist or is not a directory.
    ///
    /// Detected before the process is started.
    #[error("invalid working directory {}: {source}", .path.display())]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The native process could not be created.
    #[error("failed to start command '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The configured fixed timeout elapsed before the command finished.
    #[error("command timed out after {timeout:?}{}", unconfirmed_note(.terminated, .pid))]
    Timeout {
        timeout: Duration,
        pid: Option<u32>,
        /// Whether the process was observed to exit after the kill.
        terminated: bool,
    },

    /// A caller-supplied context was cancelled or hit its deadline.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// One of the output sinks rejected a write.
    #[error("{stream} output failed: {source}")]
    Sink {
        stream: &'static str,
        #[source]
        source: SinkError,
    },

    /// Waiting on the child process failed.
    #[error("failed to wait for command: {0}")]
    Wait(#[source] std::io::Error),

    /// An accessor was used before the command ran.
    #[error("can not read {accessor} if command was not executed")]
    NotExecuted { accessor: &'static str },

    /// `execute` was called a second time on the same command.
    #[error("command was already executed")]
    AlreadyExecuted,

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition { from: ExecState, to: ExecState },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CmdError {
    /// Whether this error came from a fixed timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CmdError::Timeout { .. })
    }

    /// Whether this error came from a caller-supplied context.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CmdError::Context(_))
    }
}

fn unconfirmed_note(terminated: &bool, pid: &Option<u32>) -> String {
    match (*terminated, *pid) {
        (true, _) => String::new(),
        (false, Some(pid)) => format!(" (could not confirm termination of pid {pid})"),
        (false, None) => " (could not confirm termination)".to_string(),
    }
}

/// A fan-out sink failed to accept a chunk.
#[derive(Error, Debug)]
#[error("error in writer '{sink}': {source}")]
pub struct SinkError {
    /// Name of the sink that failed.
    pub sink: String,
    /// Position of the sink in the fan-out.
    pub index: usize,
    #[source]
    pub source: std::io::Error,
}

/// Convenience Result type for cmdrun operations.
pub type Result<T> = std::result::Result<T, CmdError>;
