//! Process supervision: spawn, pump output, race the exit against a deadline.

use std::io;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::capture::{CaptureSinks, StreamCapture};
use super::command::Command;
use super::context::{ContextError, ExecContext};
use super::fanout::FanOutWriter;
use super::result::{ExecutionResult, UNKNOWN_EXIT_CODE};
use super::state::ExecState;
use crate::error::{CmdError, SinkError};
use crate::launcher::{LaunchRequest, ProcessBuilder};
use crate::Result;

/// Default execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for the process and its pipes after a kill.
pub const KILL_GRACE: Duration = Duration::from_millis(500);

/// Default buffer size for reading child output.
const READ_BUFFER_SIZE: usize = 4096;

type PumpResult = std::result::Result<u64, SinkError>;

/// What ends a run early.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Watch<'a> {
    /// Wait for the process however long it takes.
    Unbounded,
    /// Fixed timeout, measured from spawn.
    Timeout(Duration),
    /// Caller-supplied cancellation and deadline.
    Context(&'a ExecContext),
}

#[derive(Debug, Clone, Copy)]
enum Fired {
    Timeout(Duration),
    Context(ContextError),
}

impl Watch<'_> {
    async fn fired(&self) -> Fired {
        match self {
            Watch::Unbounded => std::future::pending().await,
            Watch::Timeout(timeout) => {
                tokio::time::sleep(*timeout).await;
                Fired::Timeout(*timeout)
            }
            Watch::Context(ctx) => Fired::Context(ctx.done().await),
        }
    }
}

enum Race {
    Exited(PumpResult, PumpResult),
    Fired(Fired),
}

/// Outcome of one supervised run.
///
/// `result` is present whenever the process was started, including runs
/// that end in an error.
#[derive(Debug)]
pub(crate) struct Supervision {
    pub result: Option<ExecutionResult>,
    pub outcome: Result<()>,
}

impl Supervision {
    fn not_started(err: CmdError) -> Self {
        Self {
            result: None,
            outcome: Err(err),
        }
    }
}

/// Runs one child process to a terminal state.
pub(crate) struct Supervisor<'a, B: ProcessBuilder + ?Sized> {
    builder: &'a B,
    watch: Watch<'a>,
}

impl<'a, B: ProcessBuilder + ?Sized> Supervisor<'a, B> {
    pub fn new(builder: &'a B, watch: Watch<'a>) -> Self {
        Self { builder, watch }
    }

    pub async fn run(
        &self,
        request: &LaunchRequest<'_>,
        capture: &StreamCapture,
        sinks: CaptureSinks,
    ) -> Supervision {
        let mut state = ExecState::Idle;

        let mut cmd = match self.builder.build(request) {
            Ok(cmd) => cmd,
            Err(err) => return Supervision::not_started(err),
        };

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                return Supervision::not_started(CmdError::SpawnFailed {
                    command: request.command.to_string(),
                    source,
                })
            }
        };
        let pid = child.id();
        advance(&mut state, ExecState::Running);
        debug!(pid, command = %request.command, "Process started");

        let (stdout_writer, stderr_writer) = capture.writers(sinks);
        let mut stdout_task = spawn_pump("stdout", child.stdout.take(), stdout_writer);
        let mut stderr_task = spawn_pump("stderr", child.stderr.take(), stderr_writer);

        let mut wait_status: Option<io::Result<ExitStatus>> = None;
        let race = {
            let exited = async {
                wait_status = Some(child.wait().await);
                let stdout = join_pump("stdout", &mut stdout_task).await;
                let stderr = join_pump("stderr", &mut stderr_task).await;
                (stdout, stderr)
            };
            tokio::select! {
                biased;
                (stdout, stderr) = exited => Race::Exited(stdout, stderr),
                fired = self.watch.fired() => Race::Fired(fired),
            }
        };

        match race {
            Race::Exited(stdout, stderr) => {
                let status = wait_status
                    .unwrap_or_else(|| Err(io::Error::other("wait did not complete")));
                let status = match status {
                    Ok(status) => status,
                    Err(err) => {
                        advance(&mut state, ExecState::Failed);
                        let result = ExecutionResult::new(capture.drain(), state, started.elapsed())
                            .with_pid(pid);
                        return Supervision {
                            result: Some(result),
                            outcome: Err(CmdError::Wait(err)),
                        };
                    }
                };

                let exit_code = self.builder.exit_code(&status);
                let outcome = match (stdout, stderr) {
                    (Err(source), _) => Err(CmdError::Sink {
                        stream: "stdout",
                        source,
                    }),
                    (_, Err(source)) => Err(CmdError::Sink {
                        stream: "stderr",
                        source,
                    }),
                    (Ok(out_bytes), Ok(err_bytes)) => {
                        trace!(pid, out_bytes, err_bytes, "Output drained");
                        Ok(())
                    }
                };

                match &outcome {
                    Ok(()) => {
                        advance(&mut state, ExecState::Completed);
                        debug!(pid, exit_code, "Process exited");
                    }
                    Err(err) => {
                        advance(&mut state, ExecState::Failed);
                        warn!(pid, exit_code, error = %err, "Output sink failed");
                    }
                }

                let result = ExecutionResult::new(capture.drain(), state, started.elapsed())
                    .with_exit_code(exit_code)
                    .with_pid(pid);
                Supervision {
                    result: Some(result),
                    outcome,
                }
            }
            Race::Fired(fired) => {
                let interrupted = match fired {
                    Fired::Timeout(_) => ExecState::TimedOut,
                    Fired::Context(_) => ExecState::Cancelled,
                };
                advance(&mut state, interrupted);
                debug!(pid, ?fired, "Deadline reached, killing process tree");

                let reaped = wait_status.and_then(|status| status.ok());
                let kill = match pid {
                    Some(pid) => self.builder.kill_tree(&mut child, pid),
                    None => Ok(crate::launcher::KillOutcome::AlreadyExited),
                };
                if let Err(err) = &kill {
                    warn!(pid, error = %err, "Failed to kill process tree");
                }

                let status = match (reaped, &kill) {
                    (Some(status), _) => Some(status),
                    (None, Ok(_)) => tokio::time::timeout(KILL_GRACE, child.wait())
                        .await
                        .ok()
                        .and_then(|status| status.ok()),
                    (None, Err(_)) => child.try_wait().ok().flatten(),
                };
                let terminated = kill.is_ok() && status.is_some();
                if !terminated {
                    warn!(pid, "Could not confirm process termination");
                    if state == ExecState::TimedOut {
                        advance(&mut state, ExecState::KilledUnconfirmed);
                    }
                }

                let drained = tokio::time::timeout(KILL_GRACE, async {
                    let stdout = join_pump("stdout", &mut stdout_task).await;
                    let stderr = join_pump("stderr", &mut stderr_task).await;
                    (stdout, stderr)
                })
                .await;
                match drained {
                    Ok((stdout, stderr)) => {
                        if let Some(err) = stdout.err().or(stderr.err()) {
                            debug!(pid, error = %err, "Sink error after deadline ignored");
                        }
                    }
                    Err(_) => {
                        warn!(pid, "Output pipes still open after kill, abandoning readers");
                        stdout_task.abort();
                        stderr_task.abort();
                    }
                }

                let exit_code = status
                    .map(|status| self.builder.exit_code(&status))
                    .unwrap_or(UNKNOWN_EXIT_CODE);
                let result = ExecutionResult::new(capture.drain(), state, started.elapsed())
                    .with_exit_code(exit_code)
                    .with_pid(pid);

                let err = match fired {
                    Fired::Timeout(timeout) => CmdError::Timeout {
                        timeout,
                        pid,
                        terminated,
                    },
                    Fired::Context(err) => CmdError::Context(err),
                };
                Supervision {
                    result: Some(result),
                    outcome: Err(err),
                }
            }
        }
    }
}

fn advance(state: &mut ExecState, target: ExecState) {
    if let Err(err) = state.transition_to(target) {
        warn!(error = %err, "Ignoring state transition");
    }
}

/// Copy one child stream into its fan-out until EOF or a sink fails.
///
/// Returning early drops the reader, so the child sees a closed pipe.
fn spawn_pump<R>(
    stream: &'static str,
    reader: Option<R>,
    mut writer: FanOutWriter,
) -> JoinHandle<PumpResult>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return Ok(0);
        };

        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break, // EOF
                Ok(n) => {
                    writer.write_chunk(&buf[..n])?;
                    total += n as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(stream, error = %e, "Read failed, treating as end of stream");
                    break;
                }
            }
        }

        writer.flush_all()?;
        Ok(total)
    })
}

async fn join_pump(stream: &'static str, handle: &mut JoinHandle<PumpResult>) -> PumpResult {
    match handle.await {
        Ok(result) => result,
        Err(err) => Err(SinkError {
            sink: format!("{stream} pump"),
            index: 0,
            source: io::Error::other(err.to_string()),
        }),
    }
}

/// Simple one-shot command execution.
pub fn execute_simple(command_line: &str) -> Result<ExecutionResult> {
    let mut cmd = Command::new(command_line);
    cmd.execute()?;
    cmd.try_result().cloned()
}

/// Execute a command with timeout.
pub fn execute_with_timeout(command_line: &str, timeout: Duration) -> Result<ExecutionResult> {
    let mut cmd = Command::new(command_line).timeout(timeout);
    cmd.execute()?;
    cmd.try_result().cloned()
}
