//! Structured error types for wimps
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Each error knows the stable exit code it maps to at the process boundary.

use std::fmt;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;
use wimps_common::exit;

use super::types::Trace;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("no command given")]
    NoCommand,

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("could not resolve the current working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    #[error("could not allocate the exec environment ({slots} slots)")]
    EnvironmentAlloc { slots: usize },

    #[error("could not create the child process: {0}")]
    Fork(Errno),

    #[error("could not install the interrupt forwarder: {0}")]
    SignalSetup(#[from] ctrlc::Error),

    #[error("failed waiting for child {pid}: {source}")]
    Wait { pid: Pid, source: Errno },

    #[error("failed to continue child {pid}: {source}")]
    TraceControl { pid: Pid, source: Errno },
}

impl SupervisorError {
    /// Exit status the launcher terminates with for this failure
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCommand => exit::NO_ARGS,
            Self::CommandNotFound(_) | Self::InvalidArgument(_) => exit::EXEC_FAILED,
            Self::WorkingDirectory(_) => exit::GETCWD_FAILED,
            Self::EnvironmentAlloc { .. } => exit::MALLOC_FAILED,
            Self::Fork(_) => exit::FORK_FAILED,
            Self::SignalSetup(_) => exit::SIGNAL_FAILED,
            Self::Wait { .. } | Self::TraceControl { .. } => exit::PTRACE_FAILED,
        }
    }
}

/// Position inside a record where reading stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStage {
    RecordStart,
    Timestamp,
    SizeMarker,
    BlockSize,
    AddressMarker,
    AddressBlock,
    RecordEnd,
}

impl fmt::Display for RecordStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RecordStart => "record start marker",
            Self::Timestamp => "timestamp",
            Self::SizeMarker => "size marker",
            Self::BlockSize => "address block size",
            Self::AddressMarker => "address marker",
            Self::AddressBlock => "address block",
            Self::RecordEnd => "record end marker",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown trace format: expected header {expected:?}, found {found:?}")]
    UnknownFormat { expected: &'static str, found: String },

    #[error("record {record}: expected {stage} {expected:?}, found byte {found:#04x}")]
    BadMarker { record: usize, stage: RecordStage, expected: char, found: u8 },

    #[error("record {record}: unexpected end of file in {stage}")]
    UnexpectedEof { record: usize, stage: RecordStage },

    #[error("record {record}: address block of {size} bytes is not a multiple of {width}")]
    MisalignedAddressBlock { record: usize, size: u64, width: usize },

    #[error("record {record}: could not allocate {size} bytes")]
    Alloc { record: usize, size: u64 },
}

impl ReadError {
    /// Exit status the reader terminates with for this failure
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => exit::READ_FAILED,
            Self::UnknownFormat { .. } => exit::UNKNOWN_FORMAT,
            Self::BadMarker { .. } | Self::MisalignedAddressBlock { .. } => exit::BAD_MARKER,
            Self::UnexpectedEof { .. } => exit::EOF,
            Self::Alloc { .. } => exit::REALLOC_FAILED,
        }
    }

    /// Index of the record that failed, if the failure is inside a record
    #[must_use]
    pub fn record(&self) -> Option<usize> {
        match self {
            Self::BadMarker { record, .. }
            | Self::UnexpectedEof { record, .. }
            | Self::MisalignedAddressBlock { record, .. }
            | Self::Alloc { record, .. } => Some(*record),
            Self::Io(_) | Self::UnknownFormat { .. } => None,
        }
    }
}

/// A failed whole-trace read
///
/// The trace as a whole is rejected, but the samples decoded before the
/// failing record are handed back explicitly rather than silently dropped or
/// silently returned as if complete.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct TraceError {
    pub error: ReadError,
    pub recovered: Trace,
}

impl TraceError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }
}

/// Failure to open a trace file (before any format parsing)
#[derive(Error, Debug)]
#[error("could not open trace file {}: {source}", path.display())]
pub struct OpenError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl OpenError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        exit::BAD_FILE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_exit_codes() {
        assert_eq!(SupervisorError::NoCommand.exit_code(), 9);
        assert_eq!(SupervisorError::Fork(Errno::EAGAIN).exit_code(), 1);
        assert_eq!(
            SupervisorError::TraceControl { pid: Pid::from_raw(1), source: Errno::ESRCH }
                .exit_code(),
            2
        );
        assert_eq!(SupervisorError::EnvironmentAlloc { slots: 3 }.exit_code(), 4);
        let cwd = std::io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(SupervisorError::WorkingDirectory(cwd).exit_code(), 5);
    }

    #[test]
    fn test_bad_marker_message_names_stage() {
        let err = ReadError::BadMarker {
            record: 3,
            stage: RecordStage::SizeMarker,
            expected: 'b',
            found: 0x7a,
        };
        assert_eq!(err.to_string(), "record 3: expected size marker 'b', found byte 0x7a");
        assert_eq!(err.record(), Some(3));
        assert_eq!(err.exit_code(), 17);
    }

    #[test]
    fn test_trace_control_error_includes_os_text() {
        let err = SupervisorError::TraceControl { pid: Pid::from_raw(42), source: Errno::ESRCH };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("ESRCH"));
    }
}
