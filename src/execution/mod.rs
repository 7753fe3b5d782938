//! Command execution engine.
//!
//! This module provides command execution capabilities:
//! - Blocking and async execution of a shell command line
//! - Fixed timeouts or caller-supplied cancellation contexts
//! - Output fan-out to internal buffers and external writers
//!
//! # Example
//!
//! ```no_run
//! use cmdrun::execution::{Command, execute_simple};
//!
//! // Simple one-shot execution
//! let result = execute_simple("echo hello").unwrap();
//! println!("Output: {}", result.stdout_text());
//!
//! // Command with options
//! use std::time::Duration;
//! let mut cmd = Command::new("cargo build")
//!     .timeout(Duration::from_secs(60))
//!     .standard_streams(true);
//! cmd.execute().unwrap();
//! println!("exit code {}", cmd.exit_code());
//! ```

mod capture;
mod command;
mod context;
mod executor;
mod fanout;
mod result;
mod state;

pub use capture::{CaptureSinks, CapturedOutput, SharedBuffer, SharedWriter, StreamCapture};
pub use command::{Command, CommandOptions};
pub use context::{ContextError, ExecContext};
pub use executor::{execute_simple, execute_with_timeout, DEFAULT_TIMEOUT, KILL_GRACE};
pub use fanout::{FanOutWriter, Sink};
pub use result::{ExecutionResult, UNKNOWN_EXIT_CODE};
pub use state::ExecState;
