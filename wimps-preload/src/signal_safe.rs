//! Async-signal-safe I/O primitives
//!
//! Everything here may run inside the sampling signal handler: raw `write(2)`
//! only, no allocation, no locks, no `std::io` types.

#![allow(unsafe_code)] // raw write(2) and errno access require unsafe

use nix::errno::Errno;
use std::fmt::Write as _;
use std::os::fd::RawFd;
use wimps_common::StackLine;

/// Consecutive attempts without progress before a write is abandoned
const MAX_STALLED_WRITES: u32 = 8;

/// Write all of `bytes` to `fd`, retrying short writes and `EINTR`/`EAGAIN`.
///
/// The loop is bounded: progress resets the stall counter, and
/// [`MAX_STALLED_WRITES`] attempts in a row without progress give up.
///
/// # Errors
/// Returns the errno of the failing `write`, or `EIO` if the descriptor
/// repeatedly accepts zero bytes.
pub fn write_all(fd: RawFd, mut bytes: &[u8]) -> Result<(), Errno> {
    let mut stalled = 0;
    while !bytes.is_empty() {
        // SAFETY: `bytes` is a live slice for the duration of the call.
        let written = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };

        if written < 0 {
            let errno = Errno::last();
            if !matches!(errno, Errno::EINTR | Errno::EAGAIN) {
                return Err(errno);
            }
            stalled += 1;
            if stalled >= MAX_STALLED_WRITES {
                return Err(errno);
            }
            continue;
        }

        if written == 0 {
            stalled += 1;
            if stalled >= MAX_STALLED_WRITES {
                return Err(Errno::EIO);
            }
            continue;
        }

        stalled = 0;
        #[allow(clippy::cast_sign_loss)]
        let advanced = written as usize;
        bytes = &bytes[advanced..];
    }
    Ok(())
}

/// Best-effort diagnostic on stderr: `wimps: <message>: <errno>`.
///
/// Failures to write the diagnostic itself are ignored.
pub fn report(message: &str, errno: Errno) {
    let mut line = StackLine::<192>::new();
    let _ = writeln!(line, "wimps: {message}: {errno}");
    let _ = write_all(libc::STDERR_FILENO, line.as_bytes());
}

/// Saves `errno` on creation and restores it on drop, so the interrupted code
/// never observes an errno clobbered by the signal handler.
pub struct ErrnoGuard(i32);

impl ErrnoGuard {
    #[must_use]
    pub fn save() -> Self {
        // SAFETY: errno is thread-local; the location is always valid.
        Self(unsafe { *libc::__errno_location() })
    }
}

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        // SAFETY: see `save`.
        unsafe {
            *libc::__errno_location() = self.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek};
    use std::os::fd::AsRawFd;

    #[test]
    fn test_write_all_writes_everything() {
        let mut file = tempfile::tempfile().unwrap();
        let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();

        write_all(file.as_raw_fd(), &payload).unwrap();

        file.rewind().unwrap();
        let mut back = Vec::new();
        file.read_to_end(&mut back).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_write_all_reports_bad_descriptor() {
        assert_eq!(write_all(-1, b"x"), Err(Errno::EBADF));
    }

    fn set_errno(value: i32) {
        unsafe {
            *libc::__errno_location() = value;
        }
    }

    #[test]
    fn test_errno_guard_restores() {
        set_errno(libc::ENOENT);
        {
            let _guard = ErrnoGuard::save();
            set_errno(libc::EBADF);
        }
        assert_eq!(Errno::last(), Errno::ENOENT);
    }
}
