//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use cmdrun::cli::{parse_args_from, Args};
use cmdrun::config::Config;
use cmdrun::{Shell, DEFAULT_TIMEOUT};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("cmdrun")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&["true"])).unwrap();

    assert_eq!(result.command_line(), "true");
    assert!(result.timeout_ms.is_none());
    assert!(!result.no_timeout);
    assert!(result.dir.is_none());
    assert!(result.env.is_empty());
    assert!(result.inherit_env.is_none());
    assert!(result.config.is_none());
    assert!(!result.quiet);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-t",
        "2000",
        "-d",
        "/tmp",
        "-e",
        "A=1",
        "--clean-env",
        "-s",
        "/bin/bash -c",
        "-q",
        "-l",
        "debug",
        "--",
        "echo",
        "$A",
    ]))
    .unwrap();

    assert_eq!(result.timeout_ms, Some(2000));
    assert_eq!(result.dir, Some(PathBuf::from("/tmp")));
    assert_eq!(result.env, vec!["A=1"]);
    assert_eq!(result.inherit_env, Some(false));
    assert_eq!(result.shell.as_deref(), Some("/bin/bash -c"));
    assert!(result.quiet);
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(result.command_line(), "echo $A");
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/cmdrun.json", "true"])).unwrap();

    assert!(result.config.is_some());
    assert_eq!(result.config.unwrap().to_str().unwrap(), "/etc/cmdrun.json");
}

#[test]
fn test_cli_invalid_timeout() {
    let result = parse_args_from(args(&["-t", "not-a-number", "true"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_missing_command() {
    let result = parse_args_from(args(&["-t", "100"]));
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("missing command"));
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
        "defaults": {
            "timeout_ms": 5000,
            "shell": "/bin/bash -c",
            "inherit_env": false,
            "working_dir": "/tmp",
            "env": ["A=1", "B=2"]
        },
        "logging": {
            "level": "debug"
        }
    }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.defaults.shell.as_deref(), Some("/bin/bash -c"));
    assert!(!config.defaults.inherit_env);
    assert_eq!(config.defaults.working_dir, Some(PathBuf::from("/tmp")));
    assert_eq!(config.defaults.env.len(), 2);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(r#"{ "defaults": { "timeout_ms": 5000, "inherit_env": false } }"#);

    // CLI args should override file
    let args = Args {
        timeout_ms: Some(250),
        inherit_env: Some(true),
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    // CLI values should win
    assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
    assert!(config.defaults.inherit_env);
}

#[test]
fn test_config_no_timeout_overrides_file() {
    let file = config_file(r#"{ "defaults": { "timeout_ms": 5000 } }"#);

    let args = Args {
        config: Some(file.path().to_path_buf()),
        no_timeout: true,
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    assert_eq!(config.timeout(), None);
}

#[test]
fn test_config_env_entries_accumulate() {
    let file = config_file(r#"{ "defaults": { "env": ["FROM_FILE=1"] } }"#);

    let args = Args {
        config: Some(file.path().to_path_buf()),
        env: vec!["FROM_CLI=1".to_string()],
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    assert_eq!(config.defaults.env, vec!["FROM_FILE=1", "FROM_CLI=1"]);
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some(PathBuf::from("/definitely/not/cmdrun.json")),
        ..Args::default()
    };

    let err = Config::load(&args).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_config_to_options() {
    let args = Args {
        timeout_ms: Some(1500),
        shell: Some("/bin/bash -c".to_string()),
        dir: Some(PathBuf::from("/tmp")),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();
    let options = config.to_options().unwrap();

    assert_eq!(options.timeout, Some(Duration::from_millis(1500)));
    assert_eq!(options.shell, Some(Shell::new("/bin/bash", ["-c"])));
    assert_eq!(options.working_dir, Some(PathBuf::from("/tmp")));
    assert!(options.stdout_writer.is_none());
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.defaults.timeout_ms, loaded.defaults.timeout_ms);
    assert_eq!(original.defaults.inherit_env, loaded.defaults.inherit_env);
}

#[test]
fn test_config_partial_deserialization() {
    // Only specify some fields, others should use defaults
    let json = r#"{"defaults": {"shell": "/bin/zsh -c"}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.defaults.shell.as_deref(), Some("/bin/zsh -c"));
    assert_eq!(config.timeout(), Some(DEFAULT_TIMEOUT)); // Default
    assert!(config.defaults.inherit_env); // Default
}
