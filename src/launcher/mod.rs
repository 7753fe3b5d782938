//! Process launcher abstraction.
//!
//! This module turns "run this text as a shell command line" into a native
//! child process. The platform variant is chosen at compile time through
//! [`NativeProcessBuilder`]; the supervisor only talks to [`ProcessBuilder`].

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::{Credential, UnixProcessBuilder};
#[cfg(windows)]
pub use windows::WindowsProcessBuilder;

/// Process builder for the current target.
#[cfg(unix)]
pub type NativeProcessBuilder = UnixProcessBuilder;
/// Process builder for the current target.
#[cfg(windows)]
pub type NativeProcessBuilder = WindowsProcessBuilder;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::CmdError;
use crate::Result;

/// Interpreter used to run the command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    /// Interpreter executable.
    pub program: PathBuf,
    /// Arguments placed before the command text.
    pub args: Vec<String>,
}

impl Shell {
    /// Create a shell from a program and its leading arguments.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a whitespace-separated shell spec such as `"/bin/bash -c"`.
    ///
    /// Returns `None` for an empty string.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }
}

/// Everything needed to start one child process.
#[derive(Debug, Clone, Default)]
pub struct LaunchRequest<'a> {
    /// Command text handed to the shell.
    pub command: &'a str,
    /// Working directory, or the caller's own when `None`.
    pub working_dir: Option<&'a Path>,
    /// `KEY=VALUE` entries.
    pub env: &'a [String],
    /// Layer `env` over the inherited environment instead of replacing it.
    pub inherit_env: bool,
    /// Interpreter override.
    pub shell: Option<&'a Shell>,
    /// Identity to run as.
    #[cfg(unix)]
    pub run_as: Option<Credential>,
}

/// What a kill attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// A kill was delivered.
    Signalled,
    /// Nothing was left to kill.
    AlreadyExited,
}

/// Builds and tears down native shell processes.
pub trait ProcessBuilder: Send + Sync {
    /// Interpreter used when the request carries none.
    fn default_shell(&self) -> Shell;

    /// Build the native command for a request.
    ///
    /// Fails with [`CmdError::WorkingDir`] before anything is spawned if the
    /// working directory is unusable.
    fn build(&self, request: &LaunchRequest<'_>) -> Result<Command>;

    /// Kill the child and, where the platform allows, its descendants.
    ///
    /// `pid` is the id recorded at spawn; the child may already have been
    /// reaped while descendants still run. Killing a tree that is already
    /// gone is not an error.
    fn kill_tree(&self, child: &mut Child, pid: u32) -> std::io::Result<KillOutcome>;

    /// Normalize an exit status to the platform's integer convention.
    ///
    /// On unix a process killed by a signal reports `128 + signal`, the
    /// value a POSIX shell would give (`137` for `SIGKILL`). `-1` means the
    /// status carried neither a code nor a signal.
    fn exit_code(&self, status: &ExitStatus) -> i32;
}

/// Check that `dir` exists and is a directory.
pub fn validate_working_dir(dir: &Path) -> Result<()> {
    let metadata = std::fs::metadata(dir).map_err(|source| CmdError::WorkingDir {
        path: dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(CmdError::WorkingDir {
            path: dir.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }
    Ok(())
}

/// Split a `KEY=VALUE` entry. An entry without `=` has an empty value.
pub fn split_env_entry(entry: &str) -> (&str, &str) {
    entry.split_once('=').unwrap_or((entry, ""))
}

/// Apply the platform-independent parts of a request.
pub(crate) fn prepare(cmd: &mut Command, request: &LaunchRequest<'_>) -> Result<()> {
    if let Some(dir) = request.working_dir {
        validate_working_dir(dir)?;
        cmd.current_dir(dir);
    }

    if !request.inherit_env {
        cmd.env_clear();
    }
    for entry in request.env {
        let (key, value) = split_env_entry(entry);
        if key.is_empty() {
            debug!(entry = %entry, "Skipping environment entry without a key");
            continue;
        }
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    Ok(())
}
