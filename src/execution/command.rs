//! Command configuration and the public execution entry points.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::error::CmdError;
#[cfg(unix)]
use crate::launcher::Credential;
use crate::launcher::{LaunchRequest, NativeProcessBuilder, ProcessBuilder, Shell};
use crate::Result;

use super::capture::{CaptureSinks, SharedWriter, StreamCapture};
use super::context::ExecContext;
use super::executor::{Supervisor, Watch, DEFAULT_TIMEOUT};
use super::fanout::Sink;
use super::result::ExecutionResult;
use super::state::ExecState;

/// Everything that can be configured on a [`Command`].
pub struct CommandOptions {
    /// Working directory. Default: the caller's current directory.
    pub working_dir: Option<PathBuf>,
    /// Fixed timeout. Default: [`DEFAULT_TIMEOUT`]. `None` or a zero
    /// duration waits forever.
    ///
    /// Ignored by [`Command::execute_with_deadline`].
    pub timeout: Option<Duration>,
    /// `KEY=VALUE` entries. Default: empty.
    pub env: Vec<String>,
    /// Layer `env` over the caller's environment. Default: `true`.
    ///
    /// When `false` the child sees only `env`.
    pub inherit_env: bool,
    /// Extra writer receiving stdout. Default: none.
    pub stdout_writer: Option<Sink>,
    /// Extra writer receiving stderr. Default: none.
    pub stderr_writer: Option<Sink>,
    /// Tee output to the caller's own stdout/stderr. Default: `false`.
    pub standard_streams: bool,
    /// Interpreter override. Default: the platform shell.
    pub shell: Option<Shell>,
    /// Identity to run as. Default: the caller's. Unix only.
    #[cfg(unix)]
    pub run_as: Option<Credential>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            timeout: Some(DEFAULT_TIMEOUT),
            env: Vec::new(),
            inherit_env: true,
            stdout_writer: None,
            stderr_writer: None,
            standard_streams: false,
            shell: None,
            #[cfg(unix)]
            run_as: None,
        }
    }
}

impl std::fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("CommandOptions");
        s.field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .field("env", &self.env)
            .field("inherit_env", &self.inherit_env)
            .field("stdout_writer", &self.stdout_writer.is_some())
            .field("stderr_writer", &self.stderr_writer.is_some())
            .field("standard_streams", &self.standard_streams)
            .field("shell", &self.shell);
        #[cfg(unix)]
        s.field("run_as", &self.run_as);
        s.finish()
    }
}

/// A single shell command invocation.
///
/// Configure it, call one of the `execute` methods once, then read the
/// captured output. Reading output before execution panics; the `try_*`
/// accessors return [`CmdError::NotExecuted`] instead.
#[derive(Debug)]
pub struct Command {
    command_line: String,
    options: CommandOptions,
    attempted: bool,
    result: Option<ExecutionResult>,
}

impl Command {
    /// Create a command with default options.
    pub fn new(command_line: impl Into<String>) -> Self {
        Self::with_options(command_line, CommandOptions::default())
    }

    /// Create a command with explicit options.
    pub fn with_options(command_line: impl Into<String>, options: CommandOptions) -> Self {
        Self {
            command_line: command_line.into(),
            options,
            attempted: false,
            result: None,
        }
    }

    /// The command text.
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// The configured options.
    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.working_dir = Some(dir.into());
        self
    }

    /// Set the fixed timeout. A zero duration disables it.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.options.timeout = Some(duration).filter(|d| !d.is_zero());
        self
    }

    /// Disable the fixed timeout.
    pub fn without_timeout(mut self) -> Self {
        self.options.timeout = None;
        self
    }

    /// Run with exactly these `KEY=VALUE` entries and nothing inherited.
    pub fn env<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.env = entries.into_iter().map(Into::into).collect();
        self.options.inherit_env = false;
        self
    }

    /// Inherit the caller's environment, overriding it with `vars`.
    pub fn inherited_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.options.inherit_env = true;
        for (key, value) in vars {
            self.push_env(key.as_ref(), value.as_ref());
        }
        self
    }

    /// Append one `KEY=VALUE` entry.
    pub fn add_env(mut self, key: &str, value: &str) -> Self {
        self.push_env(key, value);
        self
    }

    fn push_env(&mut self, key: &str, value: &str) {
        self.options.env.push(format!("{key}={value}"));
    }

    /// Copy stdout to `writer` as well as the internal buffers.
    pub fn stdout_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.options.stdout_writer = Some(Box::new(writer));
        self
    }

    /// Copy stderr to `writer` as well as the internal buffers.
    pub fn stderr_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.options.stderr_writer = Some(Box::new(writer));
        self
    }

    /// Copy both streams into one writer.
    pub fn writer(mut self, writer: impl Write + Send + 'static) -> Self {
        let shared = SharedWriter::new(writer);
        self.options.stdout_writer = Some(Box::new(shared.clone()));
        self.options.stderr_writer = Some(Box::new(shared));
        self
    }

    /// Tee output to the calling process's own stdout and stderr.
    pub fn standard_streams(mut self, enabled: bool) -> Self {
        self.options.standard_streams = enabled;
        self
    }

    /// Replace the platform shell.
    pub fn shell(mut self, shell: Shell) -> Self {
        self.options.shell = Some(shell);
        self
    }

    /// Run as another user.
    ///
    /// Unix only: std has no way to spawn under another Windows token.
    #[cfg(unix)]
    pub fn run_as(mut self, credential: Credential) -> Self {
        self.options.run_as = Some(credential);
        self
    }

    /// Run the command, blocking until it finishes or times out.
    ///
    /// Uses the configured fixed timeout. A non-zero exit code is not an
    /// error; read it with [`exit_code`](Self::exit_code).
    ///
    /// Must not be called from within a tokio runtime; use
    /// [`execute_async`](Self::execute_async) there.
    pub fn execute(&mut self) -> Result<()> {
        block_on(self.execute_async())
    }

    /// Run the command under a caller-supplied context, blocking.
    ///
    /// The context replaces the fixed timeout. When it fires the error is
    /// the context's own [`ContextError`](super::ContextError).
    pub fn execute_with_deadline(&mut self, ctx: &ExecContext) -> Result<()> {
        block_on(self.execute_with_deadline_async(ctx))
    }

    /// Async form of [`execute`](Self::execute).
    pub async fn execute_async(&mut self) -> Result<()> {
        let watch = match self.options.timeout {
            Some(timeout) if !timeout.is_zero() => Watch::Timeout(timeout),
            _ => Watch::Unbounded,
        };
        self.run_with(&NativeProcessBuilder::default(), watch).await
    }

    /// Async form of [`execute_with_deadline`](Self::execute_with_deadline).
    pub async fn execute_with_deadline_async(&mut self, ctx: &ExecContext) -> Result<()> {
        self.run_with(&NativeProcessBuilder::default(), Watch::Context(ctx))
            .await
    }

    async fn run_with<B>(&mut self, builder: &B, watch: Watch<'_>) -> Result<()>
    where
        B: ProcessBuilder + ?Sized,
    {
        if self.attempted {
            return Err(CmdError::AlreadyExecuted);
        }
        self.attempted = true;

        if let Watch::Context(ctx) = &watch {
            if let Some(err) = ctx.err() {
                debug!(error = %err, "Context done before start");
                return Err(err.into());
            }
        }

        let sinks = CaptureSinks {
            stdout: self.options.stdout_writer.take(),
            stderr: self.options.stderr_writer.take(),
            standard_streams: self.options.standard_streams,
        };
        // The run future must not borrow `self.options`: sinks are not `Sync`.
        let command_line = self.command_line.clone();
        let working_dir = self.options.working_dir.clone();
        let env = self.options.env.clone();
        let shell = self.options.shell.clone();
        let request = LaunchRequest {
            command: &command_line,
            working_dir: working_dir.as_deref(),
            env: &env,
            inherit_env: self.options.inherit_env,
            shell: shell.as_ref(),
            #[cfg(unix)]
            run_as: self.options.run_as,
        };

        let capture = StreamCapture::new();
        let supervision = Supervisor::new(builder, watch)
            .run(&request, &capture, sinks)
            .await;

        self.result = supervision.result;
        supervision.outcome
    }

    /// Whether the process ran and a result is available.
    pub fn executed(&self) -> bool {
        self.result.is_some()
    }

    /// Terminal state, or `Idle` if nothing ran.
    pub fn state(&self) -> ExecState {
        self.result
            .as_ref()
            .map(|r| r.state)
            .unwrap_or_default()
    }

    /// The execution result.
    ///
    /// # Panics
    ///
    /// Panics if the command was not executed.
    pub fn result(&self) -> &ExecutionResult {
        self.expect_result("result")
    }

    /// The execution result, or [`CmdError::NotExecuted`].
    pub fn try_result(&self) -> Result<&ExecutionResult> {
        self.checked_result("result")
    }

    /// Captured stdout.
    ///
    /// # Panics
    ///
    /// Panics if the command was not executed.
    pub fn stdout(&self) -> String {
        self.expect_result("stdout").stdout_text()
    }

    /// Captured stdout, or [`CmdError::NotExecuted`].
    pub fn try_stdout(&self) -> Result<String> {
        self.checked_result("stdout").map(ExecutionResult::stdout_text)
    }

    /// Captured stderr.
    ///
    /// # Panics
    ///
    /// Panics if the command was not executed.
    pub fn stderr(&self) -> String {
        self.expect_result("stderr").stderr_text()
    }

    /// Captured stderr, or [`CmdError::NotExecuted`].
    pub fn try_stderr(&self) -> Result<String> {
        self.checked_result("stderr").map(ExecutionResult::stderr_text)
    }

    /// Stdout and stderr interleaved.
    ///
    /// # Panics
    ///
    /// Panics if the command was not executed.
    pub fn combined(&self) -> String {
        self.expect_result("combined").combined_text()
    }

    /// Combined output, or [`CmdError::NotExecuted`].
    pub fn try_combined(&self) -> Result<String> {
        self.checked_result("combined")
            .map(ExecutionResult::combined_text)
    }

    /// Exit code of the process.
    ///
    /// # Panics
    ///
    /// Panics if the command was not executed.
    pub fn exit_code(&self) -> i32 {
        self.expect_result("exit code").exit_code
    }

    /// Exit code, or [`CmdError::NotExecuted`].
    pub fn try_exit_code(&self) -> Result<i32> {
        self.checked_result("exit code").map(|r| r.exit_code)
    }

    fn checked_result(&self, accessor: &'static str) -> Result<&ExecutionResult> {
        self.result
            .as_ref()
            .ok_or(CmdError::NotExecuted { accessor })
    }

    fn expect_result(&self, accessor: &'static str) -> &ExecutionResult {
        match self.checked_result(accessor) {
            Ok(result) => result,
            Err(err) => panic!("{err}"),
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}
