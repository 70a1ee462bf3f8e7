use std::process::Command;

use wimps_common::exit;

fn wimps_read() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wimps-read"))
}

#[test]
fn test_reader_without_trace_exits_no_args() {
    let output = wimps_read().output().unwrap();
    assert_eq!(output.status.code(), Some(exit::NO_ARGS));
}

#[test]
fn test_reader_bad_format_exits_no_args() {
    let output = wimps_read().args(["--format", "xml", "trace"]).output().unwrap();
    assert_eq!(output.status.code(), Some(exit::NO_ARGS));
}

#[test]
fn test_reader_help_exits_success() {
    let output = wimps_read().arg("--help").output().unwrap();
    assert_eq!(output.status.code(), Some(exit::SUCCESS));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--summary"));
}

#[test]
fn test_launcher_preload_without_value_exits_no_args() {
    let output = Command::new(env!("CARGO_BIN_EXE_wimps")).arg("--preload").output().unwrap();
    assert_eq!(output.status.code(), Some(exit::NO_ARGS));
}

#[test]
fn test_reader_missing_file_exits_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = wimps_read().arg(dir.path().join("missing")).output().unwrap();
    assert_eq!(output.status.code(), Some(exit::BAD_FILE));
}
