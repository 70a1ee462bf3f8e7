//! The child side of the fork
//!
//! Runs between `fork` and `execve` in a copy of a possibly multi-threaded
//! parent: only async-signal-safe calls, no allocation, never returns.

#![allow(unsafe_code)] // execve and _exit require unsafe

use std::fmt::Write as _;

use nix::errno::Errno;
use nix::sys::ptrace;
use wimps_common::{exit, StackLine};

use super::exec::PreparedExec;

/// Become traced by the parent and replace the process image.
pub(super) fn exec_traced(prepared: &PreparedExec) -> ! {
    if let Err(errno) = ptrace::traceme() {
        abort("could not request tracing", errno, exit::PTRACE_FAILED);
    }

    // SAFETY: all three pointers come from `prepared`, which owns the
    // null-terminated strings and arrays they refer to.
    unsafe {
        libc::execve(prepared.path_ptr(), prepared.argv_ptr(), prepared.envp_ptr());
    }

    // execve only returns on failure
    abort("could not execute the target", Errno::last(), exit::EXEC_FAILED)
}

fn abort(message: &str, errno: Errno, code: i32) -> ! {
    let mut line = StackLine::<192>::new();
    let _ = writeln!(line, "wimps: {message}: {errno}");
    let bytes = line.as_bytes();

    // SAFETY: write(2) and _exit(2) are async-signal-safe; `bytes` is a live
    // stack buffer.
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
        libc::_exit(code)
    }
}
