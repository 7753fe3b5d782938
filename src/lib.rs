//! # cmdrun
//!
//! Run a shell command line with a bounded lifetime.
//!
//! A [`Command`] is handed to the platform shell (`/bin/sh -c` or
//! `cmd.exe /C`), its stdout and stderr are captured into separate and
//! combined buffers and optionally copied to extra writers. A fixed timeout
//! or an external [`ExecContext`] bounds the run; when either fires the
//! whole process tree is killed and the partial output is kept.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use cmdrun::Command;
//!
//! fn main() -> cmdrun::Result<()> {
//!     cmdrun::logging::try_init().ok();
//!
//!     let mut cmd = Command::new("echo hello; exit 3")
//!         .timeout(Duration::from_secs(5));
//!     cmd.execute()?;
//!
//!     assert_eq!(cmd.stdout(), "hello\n");
//!     assert_eq!(cmd.exit_code(), 3);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod launcher;
pub mod logging;

// Re-export commonly used types
pub use error::{CmdError, Result, SinkError};
pub use execution::{
    execute_simple, execute_with_timeout, Command, CommandOptions, ContextError, ExecContext,
    ExecState, ExecutionResult, SharedBuffer, DEFAULT_TIMEOUT,
};
#[cfg(unix)]
pub use launcher::Credential;
pub use launcher::Shell;
