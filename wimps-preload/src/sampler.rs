//! Sampler lifecycle: initialization, signal handler, timer
//!
//! Initialization order matters:
//!
//! 1. Warm up the unwinder outside of signal context
//! 2. Create the trace file and write its header
//! 3. Publish the [`SamplerContext`]
//! 4. Install the signal handler
//! 5. Create and arm the monotonic interval timer
//!
//! The handler is only installed once the context exists, and the timer only
//! fires once the handler is installed.

#![allow(unsafe_code)] // sigaction and the extern "C" handler require unsafe

use std::sync::OnceLock;

use log::{debug, info};
use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigEvent, SigHandler, SigSet, SigevNotify, Signal};
use nix::sys::time::TimeSpec;
use nix::sys::timer::{Expiration, Timer, TimerSetTimeFlags};
use nix::time::{clock_gettime, ClockId};
use wimps_common::{Timestamp, SAMPLE_PERIOD, SAMPLE_SIGNAL};

use crate::capture::{capture_current_stack, warm_up};
use crate::context::{FdSink, SamplerContext, TickOutcome};
use crate::errors::SamplerError;
use crate::signal_safe::{self, ErrnoGuard};
use crate::trace_file;

/// Written once by [`start`], read by every tick.
static CONTEXT: OnceLock<SamplerContext> = OnceLock::new();

/// The running sampler's context, if initialization has completed
pub fn context() -> Option<&'static SamplerContext> {
    CONTEXT.get()
}

/// Initialize the sampler for the current process.
///
/// Calling it again after a successful start is a no-op.
///
/// # Errors
/// Any failure is fatal for the sampler; see [`SamplerError::exit_code`].
pub fn start() -> Result<(), SamplerError> {
    if CONTEXT.get().is_some() {
        return Ok(());
    }

    let frames = warm_up();
    debug!("unwinder warmed up ({frames} frames)");

    let (path, fd) = trace_file::create_for_current_process()?;
    info!("tracing to {}", path.display());

    if CONTEXT.set(SamplerContext::new(fd)).is_err() {
        return Ok(());
    }

    install_handler()?;
    info!("signal handler set for {}", signal_name());

    arm_timer()?;
    info!("timer started ({:?} period)", SAMPLE_PERIOD);

    Ok(())
}

fn sample_signal() -> Result<Signal, Errno> {
    Signal::try_from(SAMPLE_SIGNAL)
}

fn signal_name() -> &'static str {
    sample_signal().map_or("unknown signal", Signal::as_str)
}

fn install_handler() -> Result<(), SamplerError> {
    let signal = sample_signal().map_err(SamplerError::InstallHandler)?;
    let action =
        SigAction::new(SigHandler::Handler(on_sample_signal), SaFlags::SA_RESTART, SigSet::empty());

    // SAFETY: the handler only performs async-signal-safe work (see `on_sample_signal`).
    unsafe { sigaction(signal, &action) }.map_err(SamplerError::InstallHandler)?;
    Ok(())
}

fn arm_timer() -> Result<(), SamplerError> {
    let signal = sample_signal().map_err(SamplerError::TimerCreate)?;
    let event = SigEvent::new(SigevNotify::SigevSignal { signal, si_value: 0 });

    let mut timer =
        Timer::new(ClockId::CLOCK_MONOTONIC, event).map_err(SamplerError::TimerCreate)?;
    timer
        .set(Expiration::Interval(TimeSpec::from_duration(SAMPLE_PERIOD)), TimerSetTimeFlags::empty())
        .map_err(SamplerError::TimerArm)?;

    // Dropping the timer deletes it; it must tick until the process exits.
    std::mem::forget(timer);
    Ok(())
}

fn monotonic_now() -> Result<Timestamp, Errno> {
    let now = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
    #[allow(clippy::useless_conversion)]
    let ts = Timestamp::new(i64::from(now.tv_sec()), i64::from(now.tv_nsec()));
    Ok(ts)
}

/// Sampling signal handler
///
/// **Async-signal-safety**: no allocation, no locks beyond the context's
/// atomic guard, no `std::io`, no logging. Failures are reported with a raw
/// write to stderr and only cost this one sample.
extern "C" fn on_sample_signal(_signal: libc::c_int) {
    let _errno = ErrnoGuard::save();

    let Some(ctx) = CONTEXT.get() else {
        return;
    };

    let mut sink = FdSink(ctx.trace_fd());
    match ctx.tick(capture_current_stack, monotonic_now, &mut sink) {
        TickOutcome::Written | TickOutcome::Dropped => {}
        TickOutcome::ClockFailed(errno) => {
            signal_safe::report("could not read the monotonic clock", errno);
        }
        TickOutcome::WriteFailed(errno) => {
            signal_safe::report("could not write sample", errno);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;
    use wimps_common::{
        ADDRESS_WIDTH, MARKER_ADDRESSES, MARKER_BLOCK_SIZE, MARKER_RECORD_END,
        MARKER_RECORD_START, TIMESTAMP_LEN, TRACE_HEADER_V1, TRACE_MARKER_V1,
    };

    /// Set when the test binary is re-run as the sampled process
    const SAMPLED_CHILD_ENV: &str = "WIMPS_SAMPLED_CHILD";
    const RAISED_SIGNALS: i32 = 3;

    /// Count the records after the header, checking every marker and size.
    fn count_records(trace: &[u8]) -> i32 {
        let mut rest = &trace[TRACE_HEADER_V1.len()..];
        let mut records = 0;
        while let Some((&start, tail)) = rest.split_first() {
            assert_eq!(start, MARKER_RECORD_START);
            assert_eq!(tail[TIMESTAMP_LEN], MARKER_BLOCK_SIZE);
            let size_at = TIMESTAMP_LEN + 1;
            let size = u64::from_ne_bytes(tail[size_at..size_at + 8].try_into().unwrap());
            let size = usize::try_from(size).unwrap();
            assert!(size > 0 && size % ADDRESS_WIDTH == 0, "bad block size {size}");
            assert_eq!(tail[size_at + 8], MARKER_ADDRESSES);
            let end_at = size_at + 9 + size;
            assert_eq!(tail[end_at], MARKER_RECORD_END);
            rest = &tail[end_at + 1..];
            records += 1;
        }
        records
    }

    #[test]
    fn test_start_records_raised_signals() {
        if std::env::var_os(SAMPLED_CHILD_ENV).is_some() {
            start().unwrap();
            for _ in 0..RAISED_SIGNALS {
                nix::sys::signal::raise(Signal::SIGPROF).unwrap();
            }
            let written = context().unwrap().stats().written;
            std::process::exit(i32::try_from(written).unwrap());
        }

        // The sampler is process-wide and can only start once, so it runs in
        // a fresh copy of this test binary with a scratch working directory.
        let dir = tempfile::tempdir().unwrap();
        let status = Command::new(std::env::current_exe().unwrap())
            .args(["--exact", "sampler::tests::test_start_records_raised_signals"])
            .args(["--test-threads=1", "--nocapture"])
            .env(SAMPLED_CHILD_ENV, "1")
            .current_dir(dir.path())
            .status()
            .unwrap();
        let written = status.code().unwrap();
        // The timer may add a tick of its own on a slow machine
        assert!(written >= RAISED_SIGNALS, "only {written} samples written");

        let traces: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.file_name().unwrap().to_string_lossy().starts_with(TRACE_MARKER_V1))
            .collect();
        assert_eq!(traces.len(), 1, "{traces:?}");

        let mode = std::fs::metadata(&traces[0]).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let trace = std::fs::read(&traces[0]).unwrap();
        assert!(trace.starts_with(TRACE_HEADER_V1));
        assert_eq!(count_records(&trace), written);
    }

    #[test]
    fn test_sample_signal_is_sigprof() {
        assert_eq!(sample_signal(), Ok(Signal::SIGPROF));
        assert_eq!(signal_name(), "SIGPROF");
    }

    #[test]
    fn test_monotonic_now_is_monotonic() {
        let a = monotonic_now().unwrap();
        let b = monotonic_now().unwrap();
        assert!(b >= a);
        assert!((0..1_000_000_000).contains(&a.nanoseconds));
    }

    #[test]
    fn test_handler_without_context_is_a_no_op() {
        // Unit tests never run `start`, so there is no context to sample into.
        assert!(context().is_none());
        on_sample_signal(SAMPLE_SIGNAL);
    }
}
