//! cmdrun binary entry point.

use std::process::ExitCode;

use cmdrun::cli::{self, Args};
use cmdrun::config::Config;
use cmdrun::{logging, CmdError, Command};
use tracing::{debug, error, warn};

/// Exit status for a command that hit its deadline.
const EXIT_TIMEOUT: u8 = 124;
/// Exit status when the command could not be started.
const EXIT_LAUNCH_FAILED: u8 = 125;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'cmdrun --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    // Logging may already be set up by an embedding test harness.
    let _ = logging::try_init_with_level(config.log_filter());

    run(&args, &config)
}

fn run(args: &Args, config: &Config) -> ExitCode {
    let options = match config.to_options() {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    let mut cmd =
        Command::with_options(args.command_line(), options).standard_streams(!args.quiet);
    debug!(command = %cmd.command_line(), options = ?cmd.options(), "Running command");

    match cmd.execute() {
        Ok(()) => exit_status(cmd.exit_code()),
        Err(e @ (CmdError::Timeout { .. } | CmdError::Context(_))) => {
            warn!(error = %e, "Command interrupted");
            ExitCode::from(EXIT_TIMEOUT)
        }
        Err(e @ (CmdError::WorkingDir { .. } | CmdError::SpawnFailed { .. })) => {
            error!(error = %e, "Command could not be started");
            ExitCode::from(EXIT_LAUNCH_FAILED)
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            match cmd.try_exit_code() {
                Ok(code) if code != 0 => exit_status(code),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn exit_status(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
