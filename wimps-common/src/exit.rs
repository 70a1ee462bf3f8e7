//! Stable process exit codes
//!
//! Every wimps binary (launcher, sampler, reader) exits with one of these so
//! scripts can tell failure kinds apart. Values never change once released.

/// Normal termination
pub const SUCCESS: i32 = 0;

/// `fork` failed in the launcher
pub const FORK_FAILED: i32 = 1;

/// Could not become traced, wait on, or resume the child
pub const PTRACE_FAILED: i32 = 2;

/// Could not replace the child's process image with the target
pub const EXEC_FAILED: i32 = 3;

/// Could not allocate the exec environment
pub const MALLOC_FAILED: i32 = 4;

/// Could not resolve the working directory (where the sampler library lives)
pub const GETCWD_FAILED: i32 = 5;

/// Could not install a signal handler
pub const SIGNAL_FAILED: i32 = 6;

/// Could not create the sampling timer
pub const TIMER_CREATE_FAILED: i32 = 7;

/// Could not arm the sampling timer
pub const TIMER_SET_TIME_FAILED: i32 = 8;

/// Missing command line arguments
pub const NO_ARGS: i32 = 9;

/// Could not create or initialize the trace file
pub const CREATE_TRACE_FILE_FAILED: i32 = 10;

// 11 was "null argument" and 14 "assumption failed"; both are kept reserved.

/// The trace file could not be opened
pub const BAD_FILE: i32 = 12;

/// Reading the trace failed at the OS level
pub const READ_FAILED: i32 = 13;

/// The header line is not a known trace format version
pub const UNKNOWN_FORMAT: i32 = 15;

/// The trace ended in the middle of a record
pub const EOF: i32 = 16;

/// A record marker did not match, or a record is structurally impossible
pub const BAD_MARKER: i32 = 17;

/// Growing the in-memory trace failed
pub const REALLOC_FAILED: i32 = 18;
