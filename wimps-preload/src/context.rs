//! Process-wide sampler state
//!
//! Built once during initialization and then only read by the signal handler.
//! All mutation after construction goes through atomics:
//!
//! - `busy` - single-slot reentrancy guard, held while one tick is in flight
//! - `written` / `dropped` / `failed` - tick counters
//!
//! The trace file descriptor is owned here for the lifetime of the process and
//! is never closed by the handler, not even after a write error.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use nix::errno::Errno;
use wimps_common::{encode_record, Timestamp, MAX_RECORD_LEN};

use crate::capture::StackBuffer;
use crate::signal_safe;

/// Destination for framed records
///
/// Implementations are called from signal context and must not allocate,
/// lock, or otherwise do anything that is not async-signal-safe.
pub trait RecordSink {
    /// Write one complete record.
    ///
    /// # Errors
    /// Returns the errno of the failed write; the tick is abandoned but the
    /// sampler keeps running.
    fn write_record(&mut self, record: &[u8]) -> Result<(), Errno>;
}

/// Sink writing to a raw file descriptor with [`signal_safe::write_all`]
pub struct FdSink(pub RawFd);

impl RecordSink for FdSink {
    fn write_record(&mut self, record: &[u8]) -> Result<(), Errno> {
        signal_safe::write_all(self.0, record)
    }
}

/// What happened to one timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A record was written
    Written,
    /// Another tick held the guard; nothing was captured or written
    Dropped,
    /// The monotonic clock could not be read; nothing was written
    ClockFailed(Errno),
    /// The record could not be written completely
    WriteFailed(Errno),
}

/// Snapshot of the tick counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub written: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Sampler state shared between initialization and the signal handler
pub struct SamplerContext {
    trace_fd: OwnedFd,
    busy: AtomicBool,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl SamplerContext {
    /// Take ownership of an open, header-initialized trace file.
    #[must_use]
    pub fn new(trace_fd: OwnedFd) -> Self {
        Self {
            trace_fd,
            busy: AtomicBool::new(false),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn trace_fd(&self) -> RawFd {
        self.trace_fd.as_raw_fd()
    }

    #[must_use]
    pub fn stats(&self) -> SamplerStats {
        SamplerStats {
            written: self.written.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Try to claim the reentrancy guard.
    ///
    /// Returns `None` if a tick is already in flight. The guard is released
    /// when the returned value is dropped, on every path.
    pub fn try_enter(&self) -> Option<TickGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| TickGuard { busy: &self.busy })
    }

    /// Run one sampling tick: capture, timestamp, frame, write.
    ///
    /// `capture` fills the stack buffer, `clock` reads the monotonic clock and
    /// `sink` receives the framed record. Overlapping calls are never blocked;
    /// the second one returns [`TickOutcome::Dropped`] without doing any I/O.
    pub fn tick<C, K, S>(&self, capture: C, clock: K, sink: &mut S) -> TickOutcome
    where
        C: FnOnce(&mut StackBuffer),
        K: FnOnce() -> Result<Timestamp, Errno>,
        S: RecordSink + ?Sized,
    {
        let Some(_guard) = self.try_enter() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::Dropped;
        };

        let mut stack = StackBuffer::new();
        capture(&mut stack);

        let timestamp = match clock() {
            Ok(ts) => ts,
            Err(errno) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::ClockFailed(errno);
            }
        };

        let mut record = [0u8; MAX_RECORD_LEN];
        let len = match encode_record(&mut record, timestamp, stack.as_slice()) {
            Ok(len) => len,
            Err(_) => {
                // StackBuffer never holds more than MAX_FRAMES addresses
                self.failed.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::WriteFailed(Errno::EOVERFLOW);
            }
        };

        match sink.write_record(&record[..len]) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                TickOutcome::Written
            }
            Err(errno) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                TickOutcome::WriteFailed(errno)
            }
        }
    }
}

/// Held reentrancy guard; releases on drop
pub struct TickGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
