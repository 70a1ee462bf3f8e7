//! The ptrace control loop
//!
//! Under ptrace every signal aimed at the child stops it first and is handed
//! to us. The loop decides per stop whether the signal is re-delivered:
//!
//! | Stop signal          | Action                        |
//! |----------------------|-------------------------------|
//! | `SIGINT`             | continue, delivering it       |
//! | `SIGPROF` (sampler)  | continue, delivering it       |
//! | anything else        | continue, suppressing it      |
//!
//! Without re-delivering `SIGPROF` the sampler's timer would fire into the
//! void and sampling would silently stop.

use log::{debug, info};
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use wimps_common::SAMPLE_SIGNAL;

use super::status::{signal_name, ChildStatus, ExitOutcome};
use crate::domain::SupervisorError;

/// A process under trace control
///
/// The seam between the control loop and the kernel; tests drive the loop
/// with a scripted implementation.
pub trait Tracee {
    fn pid(&self) -> Pid;

    /// Block until the next status change.
    ///
    /// # Errors
    /// [`SupervisorError::Wait`] if the status cannot be collected.
    fn wait(&mut self) -> Result<ChildStatus, SupervisorError>;

    /// Resume a stopped tracee, delivering `signal` if given.
    ///
    /// # Errors
    /// [`SupervisorError::TraceControl`] if the tracee cannot be continued.
    fn resume(&mut self, signal: Option<Signal>) -> Result<(), SupervisorError>;
}

/// A real child traced with `PTRACE_TRACEME`
#[derive(Debug)]
pub struct PtraceTracee {
    pid: Pid,
}

impl PtraceTracee {
    #[must_use]
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }
}

impl Tracee for PtraceTracee {
    fn pid(&self) -> Pid {
        self.pid
    }

    #[allow(unsafe_code)] // waitpid writes through a raw pointer
    fn wait(&mut self) -> Result<ChildStatus, SupervisorError> {
        let mut status: libc::c_int = 0;
        loop {
            // SAFETY: `status` outlives the call.
            let rc = unsafe { libc::waitpid(self.pid.as_raw(), &mut status, 0) };
            if rc != -1 {
                return Ok(ChildStatus::from_raw(status));
            }
            match Errno::last() {
                Errno::EINTR => continue,
                source => return Err(SupervisorError::Wait { pid: self.pid, source }),
            }
        }
    }

    fn resume(&mut self, signal: Option<Signal>) -> Result<(), SupervisorError> {
        ptrace::cont(self.pid, signal)
            .map_err(|source| SupervisorError::TraceControl { pid: self.pid, source })
    }
}

/// The signal to deliver when continuing a child stopped by `raw`
#[must_use]
pub fn forwarded_signal(raw: i32) -> Option<Signal> {
    if raw == libc::SIGINT || raw == SAMPLE_SIGNAL {
        Signal::try_from(raw).ok()
    } else {
        None
    }
}

/// Drive `tracee` until it exits or is killed.
///
/// Returns as soon as a terminal status is seen, without waiting again.
///
/// # Errors
/// Any wait or resume failure ends supervision.
pub fn supervise<T: Tracee>(tracee: &mut T) -> Result<ExitOutcome, SupervisorError> {
    let pid = tracee.pid();

    loop {
        match tracee.wait()? {
            ChildStatus::Exited(code) => {
                info!("child {pid} exited with status {code}");
                return Ok(ExitOutcome::Exited(code));
            }
            ChildStatus::Killed(signal) => {
                info!("child {pid} killed by signal {signal} ({})", signal_name(signal));
                return Ok(ExitOutcome::Killed(signal));
            }
            ChildStatus::Stopped(raw) => {
                let forward = forwarded_signal(raw);
                if forward.is_some() {
                    debug!("child {pid} stopped by {} ({raw}), forwarding", signal_name(raw));
                } else {
                    debug!("child {pid} stopped by {} ({raw}), suppressing", signal_name(raw));
                }
                tracee.resume(forward)?;
            }
            ChildStatus::Continued => debug!("child {pid} continued"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed list of statuses and records every resume
    struct ScriptedTracee {
        statuses: VecDeque<ChildStatus>,
        resumed: Vec<Option<Signal>>,
        fail_resume: bool,
    }

    impl ScriptedTracee {
        fn new(statuses: &[ChildStatus]) -> Self {
            Self { statuses: statuses.iter().copied().collect(), resumed: Vec::new(), fail_resume: false }
        }
    }

    impl Tracee for ScriptedTracee {
        fn pid(&self) -> Pid {
            Pid::from_raw(4242)
        }

        fn wait(&mut self) -> Result<ChildStatus, SupervisorError> {
            Ok(self.statuses.pop_front().expect("waited after a terminal status"))
        }

        fn resume(&mut self, signal: Option<Signal>) -> Result<(), SupervisorError> {
            if self.fail_resume {
                return Err(SupervisorError::TraceControl { pid: self.pid(), source: Errno::ESRCH });
            }
            self.resumed.push(signal);
            Ok(())
        }
    }

    #[test]
    fn test_forwards_only_interrupt_and_sample_signal() {
        let mut tracee = ScriptedTracee::new(&[
            ChildStatus::Stopped(libc::SIGTRAP),
            ChildStatus::Stopped(libc::SIGPROF),
            ChildStatus::Stopped(libc::SIGUSR1),
            ChildStatus::Stopped(libc::SIGINT),
            ChildStatus::Stopped(libc::SIGCHLD),
            ChildStatus::Exited(0),
        ]);

        let outcome = supervise(&mut tracee).unwrap();

        assert_eq!(outcome, ExitOutcome::Exited(0));
        assert_eq!(
            tracee.resumed,
            vec![None, Some(Signal::SIGPROF), None, Some(Signal::SIGINT), None]
        );
    }

    #[test]
    fn test_realtime_stop_is_suppressed() {
        let rt = libc::SIGRTMIN() + 1;
        let mut tracee = ScriptedTracee::new(&[ChildStatus::Stopped(rt), ChildStatus::Exited(1)]);

        assert_eq!(supervise(&mut tracee).unwrap(), ExitOutcome::Exited(1));
        assert_eq!(tracee.resumed, vec![None]);
    }

    #[test]
    fn test_terminal_status_ends_without_further_waits() {
        // A trailing status would be consumed if the loop waited again
        let mut tracee =
            ScriptedTracee::new(&[ChildStatus::Killed(libc::SIGKILL), ChildStatus::Stopped(2)]);

        assert_eq!(supervise(&mut tracee).unwrap(), ExitOutcome::Killed(libc::SIGKILL));
        assert_eq!(tracee.statuses.len(), 1);
        assert!(tracee.resumed.is_empty());
    }

    #[test]
    fn test_continued_is_not_resumed() {
        let mut tracee = ScriptedTracee::new(&[ChildStatus::Continued, ChildStatus::Exited(0)]);
        supervise(&mut tracee).unwrap();
        assert!(tracee.resumed.is_empty());
    }

    #[test]
    fn test_resume_failure_is_fatal() {
        let mut tracee =
            ScriptedTracee::new(&[ChildStatus::Stopped(libc::SIGPROF), ChildStatus::Exited(0)]);
        tracee.fail_resume = true;

        let err = supervise(&mut tracee).unwrap_err();

        assert!(matches!(err, SupervisorError::TraceControl { source: Errno::ESRCH, .. }));
        assert_eq!(err.exit_code(), wimps_common::exit::PTRACE_FAILED);
    }

    #[test]
    fn test_forwarded_signal_table() {
        assert_eq!(forwarded_signal(libc::SIGINT), Some(Signal::SIGINT));
        assert_eq!(forwarded_signal(SAMPLE_SIGNAL), Some(Signal::SIGPROF));
        assert_eq!(forwarded_signal(libc::SIGTERM), None);
        assert_eq!(forwarded_signal(libc::SIGSEGV), None);
    }
}
