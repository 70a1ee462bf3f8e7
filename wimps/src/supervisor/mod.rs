//! Process supervisor
//!
//! Launches the target under ptrace with the sampler injected, then relays
//! signals until it ends:
//! - Exec preparation (PATH lookup, argv, envp with `LD_PRELOAD`)
//! - The child side of the fork
//! - Wait status decoding
//! - The control loop and its `Tracee` seam

mod child;
pub mod control;
pub mod exec;
pub mod status;

use std::path::PathBuf;

use log::{error, info, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::{fork, ForkResult, Pid};

use crate::domain::SupervisorError;

pub use control::{forwarded_signal, supervise, PtraceTracee, Tracee};
pub use exec::{preload_path, resolve_executable, ExecEnv, PreparedExec};
pub use status::{signal_name, ChildStatus, ExitOutcome};

/// Launches one target and supervises it to completion
#[derive(Debug, Clone)]
pub struct Supervisor {
    preload: Option<PathBuf>,
    forward_interrupts: bool,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Sampler from the working directory, Ctrl+C forwarded to the child
    #[must_use]
    pub fn new() -> Self {
        Self { preload: None, forward_interrupts: true }
    }

    /// Inject this sampler library instead of the default.
    #[must_use]
    pub fn preload(mut self, path: impl Into<PathBuf>) -> Self {
        self.preload = Some(path.into());
        self
    }

    /// Whether to install the process-wide Ctrl+C forwarder.
    ///
    /// Only one such handler can exist per process.
    #[must_use]
    pub fn forward_interrupts(mut self, enabled: bool) -> Self {
        self.forward_interrupts = enabled;
        self
    }

    /// Run `command` (program followed by its arguments) under supervision.
    ///
    /// # Errors
    /// Setup failures before the fork, the fork itself, installing the
    /// interrupt forwarder, and wait/resume failures during supervision.
    /// Failures inside the child (tracing request, exec) show up as the
    /// child exiting with the matching exit code.
    pub fn launch(&self, command: &[String]) -> Result<ExitOutcome, SupervisorError> {
        let preload = preload_path(self.preload.as_deref())?;
        if !preload.is_file() {
            warn!("sampler library {} not found; the target will run unsampled", preload.display());
        }

        let prepared = PreparedExec::new(command, &preload)?;
        info!("launching {} with {}", prepared.program().display(), preload.display());

        // SAFETY: the child branch only calls async-signal-safe functions on
        // data prepared above, then execs or exits.
        #[allow(unsafe_code)]
        let fork_result = unsafe { fork() }.map_err(SupervisorError::Fork)?;

        let pid = match fork_result {
            ForkResult::Child => child::exec_traced(&prepared),
            ForkResult::Parent { child } => child,
        };
        info!("child {pid} started");

        if self.forward_interrupts {
            if let Err(err) = forward_interrupts_to(pid) {
                abandon(pid);
                return Err(err);
            }
        }

        supervise(&mut PtraceTracee::new(pid))
    }
}

/// Launch `command` with the default configuration.
///
/// # Errors
/// See [`Supervisor::launch`].
pub fn launch(command: &[String]) -> Result<ExitOutcome, SupervisorError> {
    Supervisor::new().launch(command)
}

fn forward_interrupts_to(pid: Pid) -> Result<(), SupervisorError> {
    ctrlc::set_handler(move || {
        if let Err(errno) = kill(pid, Signal::SIGINT) {
            error!("could not forward SIGINT to child {pid}: {errno}");
        }
    })?;
    Ok(())
}

/// Kill and reap a child that can no longer be supervised.
fn abandon(pid: Pid) {
    let _ = kill(pid, Signal::SIGKILL);
    let mut tracee = PtraceTracee::new(pid);
    while let Ok(status) = tracee.wait() {
        if status.is_terminal() {
            break;
        }
    }
}
