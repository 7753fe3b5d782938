//! POSIX shell launcher.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{prepare, KillOutcome, LaunchRequest, ProcessBuilder, Shell};
use crate::Result;

/// Identity the child runs as.
///
/// Switching to another user normally requires privileges; the values are
/// handed to the spawn unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credential {
    pub uid: u32,
    pub gid: u32,
}

impl Credential {
    /// Credential for the given user and group ids.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Credential of the calling process.
    pub fn current() -> Self {
        // SAFETY: getuid and getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { uid, gid }
    }
}

/// Runs commands through `/bin/sh -c` in their own process group.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessBuilder;

impl ProcessBuilder for UnixProcessBuilder {
    fn default_shell(&self) -> Shell {
        Shell::new("/bin/sh", ["-c"])
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
        cmd.args(&shell.args).arg(request.command);
        prepare(&mut cmd, request)?;

        // Leader of a fresh group so the whole tree can be signalled at once.
        cmd.process_group(0);

        if let Some(credential) = request.run_as {
            cmd.uid(credential.uid).gid(credential.gid);
        }

        Ok(cmd)
    }

    fn kill_tree(&self, child: &mut Child, pid: u32) -> std::io::Result<KillOutcome> {
        let Ok(pgid) = libc::pid_t::try_from(pid) else {
            child.start_kill()?;
            return Ok(KillOutcome::Signalled);
        };

        // SAFETY: killpg only sends a signal; pgid is the child's own group.
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
            debug!(pid, "Sent SIGKILL to process group");
            return Ok(KillOutcome::Signalled);
        }

        let group_err = std::io::Error::last_os_error();
        if group_err.raw_os_error() == Some(libc::ESRCH) {
            debug!(pid, "Process group already gone");
            return Ok(KillOutcome::AlreadyExited);
        }

        warn!(pid, error = %group_err, "Failed to kill process group, killing child only");
        if child.id().is_none() {
            return Err(group_err);
        }
        match child.start_kill() {
            Ok(()) => Ok(KillOutcome::Signalled),
            Err(kill_err) => Err(std::io::Error::other(format!(
                "killpg failed: {group_err}; kill failed: {kill_err}"
            ))),
        }
    }

    fn exit_code(&self, status: &ExitStatus) -> i32 {
        status
            .code()
            .or_else(|| status.signal().map(|signal| 128 + signal))
            .unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shell() {
        let shell = UnixProcessBuilder.default_shell();
        assert_eq!(shell.program, std::path::PathBuf::from("/bin/sh"));
        assert_eq!(shell.args, vec!["-c"]);
    }

    #[test]
    fn test_exit_code_normal() {
        // Raw wait status: exit code lives in the high byte.
        let status = ExitStatus::from_raw(120 << 8);
        assert_eq!(UnixProcessBuilder.exit_code(&status), 120);
    }

    #[test]
    fn test_exit_code_signalled() {
        let status = ExitStatus::from_raw(libc::SIGKILL);
        assert_eq!(UnixProcessBuilder.exit_code(&status), 128 + libc::SIGKILL);
    }

    #[test]
    fn test_credential_current() {
        let credential = Credential::current();
        // SAFETY: see Credential::current.
        assert_eq!(credential.uid, unsafe { libc::getuid() });
        assert_eq!(Credential::new(1, 2), Credential { uid: 1, gid: 2 });
    }

    #[test]
    fn test_build_rejects_missing_dir() {
        let request = LaunchRequest {
            command: "true",
            working_dir: Some(std::path::Path::new("/invalid")),
            ..Default::default()
        };
        let err = UnixProcessBuilder.build(&request).unwrap_err();
        assert!(matches!(err, crate::CmdError::WorkingDir { .. }));
    }

    #[tokio::test]
    async fn test_kill_tree_after_exit_is_noop() {
        let request = LaunchRequest {
            command: "exit 0",
            inherit_env: true,
            ..Default::default()
        };
        let mut child = UnixProcessBuilder.build(&request).unwrap().spawn().unwrap();
        let pid = child.id().unwrap();
        child.wait().await.unwrap();

        let outcome = UnixProcessBuilder.kill_tree(&mut child, pid).unwrap();
        assert_eq!(outcome, KillOutcome::AlreadyExited);
    }

    #[tokio::test]
    async fn test_kill_tree_running_child() {
        let request = LaunchRequest {
            command: "sleep 5",
            inherit_env: true,
            ..Default::default()
        };
        let mut child = UnixProcessBuilder.build(&request).unwrap().spawn().unwrap();
        let pid = child.id().unwrap();

        let outcome = UnixProcessBuilder.kill_tree(&mut child, pid).unwrap();
        assert_eq!(outcome, KillOutcome::Signalled);

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }
}
