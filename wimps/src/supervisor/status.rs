//! Child status decoding
//!
//! Raw `waitpid` statuses are decoded with the libc `W*` macros rather than
//! nix's `WaitStatus`, so a stop on a signal nix has no variant for (realtime
//! signals) is still reported instead of failing the wait.

use std::fmt;

use nix::sys::signal::Signal;

/// Status change reported by one wait on the traced child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Stopped under ptrace on delivery of this signal
    Stopped(i32),
    /// Exited normally with this code (terminal)
    Exited(i32),
    /// Terminated by this signal (terminal)
    Killed(i32),
    /// Resumed by `SIGCONT`; nothing to do
    Continued,
}

impl ChildStatus {
    /// Decode a raw status as filled in by `waitpid(2)`.
    #[must_use]
    pub fn from_raw(status: libc::c_int) -> Self {
        if libc::WIFEXITED(status) {
            Self::Exited(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            Self::Killed(libc::WTERMSIG(status))
        } else if libc::WIFSTOPPED(status) {
            Self::Stopped(libc::WSTOPSIG(status))
        } else {
            Self::Continued
        }
    }

    /// Whether no further status changes can follow
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exited(_) | Self::Killed(_))
    }
}

/// How the traced child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Killed(i32),
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Exited(code) => write!(f, "exited with status {code}"),
            Self::Killed(signal) => write!(f, "killed by signal {signal} ({})", signal_name(signal)),
        }
    }
}

/// Human-readable signal name, `"unknown"` for signals nix does not model
#[must_use]
pub fn signal_name(signal: i32) -> &'static str {
    Signal::try_from(signal).map_or("unknown", Signal::as_str)
}
