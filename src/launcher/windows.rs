//! Native command interpreter launcher for Windows.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{prepare, KillOutcome, LaunchRequest, ProcessBuilder, Shell};
use crate::Result;

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Runs commands through `cmd.exe /C`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsProcessBuilder;

impl ProcessBuilder for WindowsProcessBuilder {
    fn default_shell(&self) -> Shell {
        Shell::new(r"C:\windows\system32\cmd.exe", ["/C"])
    }

    fn build(&self, request: &LaunchRequest<'_>) -> Result<Command> {
        let default_shell;
        let shell = match request.shell {
            Some(shell) => shell,
            None => {
                default_shell = self.default_shell();
                &default_shell
            }
        };

        let mut cmd = Command::new(&shell.program);
        // cmd.exe does its own parsing; quoting the text would change it.
        cmd.args(&shell.args).raw_arg(request.command);
        prepare(&mut cmd, request)?;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);

        Ok(cmd)
    }

    fn kill_tree(&self, child: &mut Child, pid: u32) -> std::io::Result<KillOutcome> {
        // Blocks the runtime thread until taskkill returns. `block_in_place`
        // panics on the current-thread runtime behind `Command::execute`.
        let taskkill = std::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match taskkill {
            Ok(status) if status.success() => {
                debug!(pid, "taskkill terminated process tree");
                return Ok(KillOutcome::Signalled);
            }
            Ok(status) => warn!(pid, %status, "taskkill failed, killing child only"),
            Err(e) => warn!(pid, error = %e, "taskkill unavailable, killing child only"),
        }

        if child.id().is_none() {
            return Ok(KillOutcome::AlreadyExited);
        }
        child.start_kill()?;
        Ok(KillOutcome::Signalled)
    }

    fn exit_code(&self, status: &ExitStatus) -> i32 {
        status.code().unwrap_or(-1)
    }
}
