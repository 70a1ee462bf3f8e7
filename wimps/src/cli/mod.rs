//! Command-line interface for wimps
//!
//! Argument definitions for the launcher (`wimps`) and the reader (`wimps-read`).

pub mod args;

use clap::error::ErrorKind;
use clap::Parser;
use wimps_common::exit;

pub use args::{LaunchArgs, OutputFormat, ReadArgs};

/// Exit status for a failed parse: 0 for help and version output, otherwise
/// `NO_ARGS` rather than clap's default of 2 (which is `PTRACE_FAILED` here).
#[must_use]
pub fn usage_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit::SUCCESS,
        _ => exit::NO_ARGS,
    }
}

/// Parse the process arguments, exiting with [`usage_exit_code`] on failure.
#[must_use]
pub fn parse_or_exit<P: Parser>() -> P {
    P::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        std::process::exit(usage_exit_code(&err));
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_arguments_map_to_no_args() {
        let err = LaunchArgs::try_parse_from(["wimps"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), exit::NO_ARGS);

        let err = ReadArgs::try_parse_from(["wimps-read"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), exit::NO_ARGS);
    }

    #[test]
    fn test_invalid_values_map_to_no_args() {
        let err = LaunchArgs::try_parse_from(["wimps", "--preload"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), exit::NO_ARGS);

        let err = ReadArgs::try_parse_from(["wimps-read", "--format", "xml", "t"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), exit::NO_ARGS);
    }

    #[test]
    fn test_help_and_version_succeed() {
        let err = ReadArgs::try_parse_from(["wimps-read", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), exit::SUCCESS);

        let err = LaunchArgs::try_parse_from(["wimps", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(&err), exit::SUCCESS);
    }
}
