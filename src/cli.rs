//! Command-line interface for cmdrun.
//!
//! Uses lexopt to keep the binary small.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Command words, joined with spaces into the command line.
    pub command: Vec<String>,
    /// Timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Disable the timeout.
    pub no_timeout: bool,
    /// Working directory.
    pub dir: Option<PathBuf>,
    /// `KEY=VALUE` entries.
    pub env: Vec<String>,
    /// `Some(true)` for `--inherit-env`, `Some(false)` for `--clean-env`.
    pub inherit_env: Option<bool>,
    /// Interpreter override, e.g. `"/bin/bash -c"`.
    pub shell: Option<String>,
    /// Do not tee output to the terminal.
    pub quiet: bool,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// The command line handed to the shell.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let ms = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("timeout", value))?;
                result.timeout_ms = Some(ms);
            }
            Long("no-timeout") => {
                result.no_timeout = true;
            }
            Short('d') | Long("dir") => {
                result.dir = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("env") => {
                let value: String = parser.value()?.parse()?;
                if !value.contains('=') {
                    return Err(ArgsError::InvalidValue("env", value));
                }
                result.env.push(value);
            }
            Long("inherit-env") => {
                result.inherit_env = Some(true);
            }
            Long("clean-env") => {
                result.inherit_env = Some(false);
            }
            Short('s') | Long("shell") => {
                result.shell = Some(parser.value()?.parse()?);
            }
            Short('q') | Long("quiet") => {
                result.quiet = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                // Everything from the first word on belongs to the command.
                result.command.push(val.string()?);
                for raw in parser.raw_args()? {
                    result.command.push(
                        raw.into_string()
                            .map_err(|raw| ArgsError::NonUnicode(raw.to_string_lossy().into()))?,
                    );
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.command.is_empty() && !result.help && !result.version {
        return Err(ArgsError::MissingCommand);
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"cmdrun {version}
Run a shell command with a timeout, capturing its output

USAGE:
    cmdrun [OPTIONS] [--] <COMMAND>...

OPTIONS:
    -t, --timeout <MS>      Kill the command after MS milliseconds [default: 60000]
        --no-timeout        Wait for the command however long it takes
    -d, --dir <DIR>         Working directory
    -e, --env <KEY=VALUE>   Set an environment variable (repeatable)
        --inherit-env       Layer --env over the current environment [default]
        --clean-env         Run with only the --env entries
    -s, --shell <SHELL>     Interpreter and its flags, e.g. "/bin/bash -c"
    -q, --quiet             Do not copy output to the terminal
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    CMDRUN_TIMEOUT_MS       Timeout in milliseconds, 0 disables (overrides config)
    CMDRUN_SHELL            Interpreter (overrides config)
    CMDRUN_INHERIT_ENV      true/false (overrides config)
    CMDRUN_LOG_LEVEL        Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXIT STATUS:
    The command's own exit code, 124 on timeout or cancellation,
    125 if the command could not be started.

EXAMPLES:
    # Give a build two minutes
    cmdrun -t 120000 -- cargo build

    # Run in another directory with a clean environment
    cmdrun -d /tmp --clean-env -e PATH=/usr/bin -- ls -la
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("cmdrun {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// No command given.
    MissingCommand,
    /// A command word is not valid UTF-8.
    NonUnicode(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::MissingCommand => write!(f, "missing command to run"),
            Self::NonUnicode(arg) => write!(f, "argument is not valid unicode: '{}'", arg),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("cmdrun")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_missing_command() {
        let result = parse_args_from(args(&[]));
        assert!(matches!(result, Err(ArgsError::MissingCommand)));
    }

    #[test]
    fn test_simple_command() {
        let result = parse_args_from(args(&["echo", "hello"])).unwrap();
        assert_eq!(result.command_line(), "echo hello");
        assert!(result.timeout_ms.is_none());
        assert!(!result.quiet);
    }

    #[test]
    fn test_options_after_command_belong_to_command() {
        let result = parse_args_from(args(&["-q", "ls", "-t", "-l"])).unwrap();
        assert!(result.quiet);
        assert!(result.log_level.is_none());
        assert_eq!(result.command, vec!["ls", "-t", "-l"]);
    }

    #[test]
    fn test_double_dash() {
        let result = parse_args_from(args(&["-t", "500", "--", "-weird", "arg"])).unwrap();
        assert_eq!(result.timeout_ms, Some(500));
        assert_eq!(result.command_line(), "-weird arg");
    }

    #[test]
    fn test_long_options() {
        let result = parse_args_from(args(&[
            "--timeout",
            "1500",
            "--dir",
            "/tmp",
            "--shell",
            "/bin/bash -c",
            "true",
        ]))
        .unwrap();
        assert_eq!(result.timeout_ms, Some(1500));
        assert_eq!(result.dir, Some(PathBuf::from("/tmp")));
        assert_eq!(result.shell.as_deref(), Some("/bin/bash -c"));
    }

    #[test]
    fn test_env_repeatable() {
        let result = parse_args_from(args(&["-e", "A=1", "--env", "B=2", "env"])).unwrap();
        assert_eq!(result.env, vec!["A=1", "B=2"]);
    }

    #[test]
    fn test_env_requires_equals() {
        let result = parse_args_from(args(&["-e", "NOEQUALS", "env"]));
        assert!(matches!(result, Err(ArgsError::InvalidValue("env", _))));
    }

    #[test]
    fn test_env_inheritance_flags() {
        let result = parse_args_from(args(&["--clean-env", "env"])).unwrap();
        assert_eq!(result.inherit_env, Some(false));

        let result = parse_args_from(args(&["--clean-env", "--inherit-env", "env"])).unwrap();
        assert_eq!(result.inherit_env, Some(true));
    }

    #[test]
    fn test_no_timeout() {
        let result = parse_args_from(args(&["--no-timeout", "sleep 1"])).unwrap();
        assert!(result.no_timeout);
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/cmdrun.json", "true"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/cmdrun.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);

        let result = parse_args_from(args(&["--version"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug", "true"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = parse_args_from(args(&["-t", "soon", "true"]));
        assert!(matches!(result, Err(ArgsError::InvalidValue("timeout", _))));
    }

    #[test]
    fn test_unknown_option() {
        let result = parse_args_from(args(&["--bogus", "true"]));
        assert!(matches!(result, Err(ArgsError::Lexopt(_))));
    }
}
