//! Sampler initialization errors
//!
//! Every variant is fatal: the sampler cannot do anything useful half set up,
//! so the whole process exits with the variant's stable exit code.

use nix::errno::Errno;
use std::path::PathBuf;
use thiserror::Error;
use wimps_common::exit;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("could not create trace file {}: {source}", path.display())]
    CreateTraceFile { path: PathBuf, source: std::io::Error },

    #[error("could not write trace header to {}: {source}", path.display())]
    WriteHeader { path: PathBuf, source: std::io::Error },

    #[error("could not install the sampling signal handler: {0}")]
    InstallHandler(Errno),

    #[error("could not create the sampling timer: {0}")]
    TimerCreate(Errno),

    #[error("could not arm the sampling timer: {0}")]
    TimerArm(Errno),
}

impl SamplerError {
    /// Exit status the process terminates with for this failure
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CreateTraceFile { .. } | Self::WriteHeader { .. } => {
                exit::CREATE_TRACE_FILE_FAILED
            }
            Self::InstallHandler(_) => exit::SIGNAL_FAILED,
            Self::TimerCreate(_) => exit::TIMER_CREATE_FAILED,
            Self::TimerArm(_) => exit::TIMER_SET_TIME_FAILED,
        }
    }
}
