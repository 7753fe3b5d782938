//! Execution result types.

use std::time::Duration;

use super::capture::CapturedOutput;
use super::state::ExecState;

/// Exit code reported when the process could not be reaped.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Outcome of one command execution. Created once, never modified.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Platform-normalized exit code.
    pub exit_code: i32,
    /// Stdout and stderr interleaved in arrival order.
    pub combined: Vec<u8>,
    /// Stdout only.
    pub stdout: Vec<u8>,
    /// Stderr only.
    pub stderr: Vec<u8>,
    /// Terminal state reached.
    pub state: ExecState,
    /// Process id of the shell, if it was started.
    pub pid: Option<u32>,
    /// Wall-clock time from spawn to terminal state.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Create a result from captured output.
    pub fn new(output: CapturedOutput, state: ExecState, duration: Duration) -> Self {
        Self {
            exit_code: UNKNOWN_EXIT_CODE,
            combined: output.combined,
            stdout: output.stdout,
            stderr: output.stderr,
            state,
            pid: None,
            duration,
        }
    }

    /// Set the exit code.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Set the process id.
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Check if command completed with exit code 0.
    pub fn success(&self) -> bool {
        self.state == ExecState::Completed && self.exit_code == 0
    }

    /// Check if a deadline ended the execution.
    pub fn interrupted(&self) -> bool {
        self.state.is_interrupted()
    }

    /// Stdout as text (lossy UTF-8).
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr as text (lossy UTF-8).
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Combined output as text (lossy UTF-8).
    pub fn combined_text(&self) -> String {
        String::from_utf8_lossy(&self.combined).into_owned()
    }
}
