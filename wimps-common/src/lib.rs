//! # Shared Trace Format (Sampler ↔ Reader)
//!
//! Defines the on-disk trace format shared between the in-process sampler
//! (which writes it from a signal handler) and the offline reader. Everything
//! here is `no_std` and allocation-free so the sampler can use it while the
//! target program is interrupted at an arbitrary instruction.
//!
//! ## File Layout
//!
//! ```text
//! _wimps_trace_v1\n
//! 'a' | seconds (8) nanoseconds (8) | 'b' | block size (8) | 'c' | addresses (block size) | 'd'
//! 'a' | ...                                                                                | 'd'
//! <EOF>
//! ```
//!
//! All integers are host-endian. Addresses are pointer-width. The single-byte
//! markers carry no information; they only let the reader tell a misaligned
//! stream apart from valid-but-odd data.
//!
//! ## Key Items
//!
//! - [`Timestamp`] - Monotonic clock reading stored in every record
//! - [`encode_record`] - Frames one sample into a caller-provided buffer
//! - [`exit`] - Stable process exit codes shared by every wimps binary

#![no_std]

use core::fmt;
use core::time::Duration;

pub mod exit;

// ============================================================================
// Format Constants
// ============================================================================

/// Format-version marker. The first line of every trace file is exactly this.
pub const TRACE_MARKER_V1: &str = "_wimps_trace_v1";

/// Full header line as written to disk (marker plus newline).
pub const TRACE_HEADER_V1: &[u8] = b"_wimps_trace_v1\n";

/// Opens a record. End-of-file where this marker would be is a clean end of trace.
pub const MARKER_RECORD_START: u8 = b'a';

/// Separates the timestamp from the address block size.
pub const MARKER_BLOCK_SIZE: u8 = b'b';

/// Separates the address block size from the address block.
pub const MARKER_ADDRESSES: u8 = b'c';

/// Closes a record.
pub const MARKER_RECORD_END: u8 = b'd';

/// Width of one recorded address in bytes (the platform word size)
pub const ADDRESS_WIDTH: usize = core::mem::size_of::<usize>();

/// Encoded timestamp: seconds and nanoseconds, 8 bytes each
pub const TIMESTAMP_LEN: usize = 16;

/// Encoded address block size (unsigned, 8 bytes)
pub const BLOCK_SIZE_LEN: usize = 8;

/// Bytes preceding the address block: `'a'`, timestamp, `'b'`, size, `'c'`
pub const RECORD_PREFIX_LEN: usize = 1 + TIMESTAMP_LEN + 1 + BLOCK_SIZE_LEN + 1;

/// Bytes following the address block: `'d'`
pub const RECORD_SUFFIX_LEN: usize = 1;

// ============================================================================
// Sampler Parameters
// ============================================================================

/// Maximum number of stack frames captured per sample
///
/// Deeper stacks are truncated; the capture buffer lives on the signal
/// handler's stack and never grows.
pub const MAX_FRAMES: usize = 128;

/// Largest record the sampler can produce
pub const MAX_RECORD_LEN: usize = record_len(MAX_FRAMES);

/// Signal raised by the sampling timer
///
/// The supervisor must forward this signal when the traced child stops on it,
/// otherwise sampling silently stops.
pub const SAMPLE_SIGNAL: libc::c_int = libc::SIGPROF;

/// Interval between two samples
pub const SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// File name of the sampler shared object, looked up in the supervisor's
/// working directory unless overridden.
pub const PRELOAD_LIBRARY: &str = "libwimps_preload.so";

/// Environment variable used to inject the sampler into the target
pub const PRELOAD_ENV_VAR: &str = "LD_PRELOAD";

/// Size in bytes of a complete record holding `frames` addresses.
#[must_use]
pub const fn record_len(frames: usize) -> usize {
    RECORD_PREFIX_LEN + frames * ADDRESS_WIDTH + RECORD_SUFFIX_LEN
}

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Monotonic clock reading
///
/// Never wall-clock time; only meaningful for ordering and spacing samples
/// within a single trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl Timestamp {
    #[must_use]
    pub const fn new(seconds: i64, nanoseconds: i64) -> Self {
        Self { seconds, nanoseconds }
    }

    /// Encode as 16 host-endian bytes (seconds then nanoseconds)
    #[must_use]
    pub fn to_bytes(self) -> [u8; TIMESTAMP_LEN] {
        let mut out = [0u8; TIMESTAMP_LEN];
        out[..8].copy_from_slice(&self.seconds.to_ne_bytes());
        out[8..].copy_from_slice(&self.nanoseconds.to_ne_bytes());
        out
    }

    /// Inverse of [`Timestamp::to_bytes`]
    #[must_use]
    pub fn from_bytes(bytes: [u8; TIMESTAMP_LEN]) -> Self {
        let mut seconds = [0u8; 8];
        let mut nanoseconds = [0u8; 8];
        seconds.copy_from_slice(&bytes[..8]);
        nanoseconds.copy_from_slice(&bytes[8..]);
        Self { seconds: i64::from_ne_bytes(seconds), nanoseconds: i64::from_ne_bytes(nanoseconds) }
    }

    /// Signed difference `self - earlier` in nanoseconds
    #[must_use]
    pub fn nanos_since(self, earlier: Timestamp) -> i128 {
        let this = i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanoseconds);
        let that = i128::from(earlier.seconds) * 1_000_000_000 + i128::from(earlier.nanoseconds);
        this - that
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// Error returned by [`encode_record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The output buffer cannot hold the whole record
    BufferTooSmall { needed: usize, available: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { needed, available } => {
                write!(f, "record needs {needed} bytes but buffer holds {available}")
            }
        }
    }
}

/// Frame one sample into `out`, returning the number of bytes used.
///
/// Never allocates and never panics, so it can run inside a signal handler.
/// The record is built completely before anything is written to disk; the
/// caller hands the returned prefix of `out` to a single write loop.
///
/// # Errors
/// Returns [`EncodeError::BufferTooSmall`] if `out` is shorter than
/// [`record_len`] for `addresses.len()` frames. Nothing is written in that case.
pub fn encode_record(
    out: &mut [u8],
    timestamp: Timestamp,
    addresses: &[usize],
) -> Result<usize, EncodeError> {
    let needed = record_len(addresses.len());
    if out.len() < needed {
        return Err(EncodeError::BufferTooSmall { needed, available: out.len() });
    }

    let block_size = (addresses.len() * ADDRESS_WIDTH) as u64;

    let mut frame = FrameCursor { out, pos: 0 };
    frame.put(&[MARKER_RECORD_START]);
    frame.put(&timestamp.to_bytes());
    frame.put(&[MARKER_BLOCK_SIZE]);
    frame.put(&block_size.to_ne_bytes());
    frame.put(&[MARKER_ADDRESSES]);
    for address in addresses {
        frame.put(&address.to_ne_bytes());
    }
    frame.put(&[MARKER_RECORD_END]);

    debug_assert_eq!(frame.pos, needed);
    Ok(frame.pos)
}

/// Sequential writer over a buffer already checked to be large enough
struct FrameCursor<'a> {
    out: &'a mut [u8],
    pos: usize,
}

impl FrameCursor<'_> {
    fn put(&mut self, bytes: &[u8]) {
        self.out[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

// ============================================================================
// Signal-Safe Diagnostics
// ============================================================================

/// Fixed-capacity line buffer implementing [`fmt::Write`]
///
/// Lets code running in a signal handler or a freshly forked child format a
/// diagnostic (including numbers and errno names) without touching the heap.
/// Output that does not fit is silently cut off.
pub struct StackLine<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> StackLine<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: [0u8; N], len: 0 }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == N
    }
}

impl<const N: usize> Default for StackLine<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for StackLine<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = N - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_record_layout() {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let ts = Timestamp::new(12, 345);
        let len = encode_record(&mut buf, ts, &[0x1000, 0x2000]).unwrap();

        assert_eq!(len, record_len(2));
        assert_eq!(buf[0], MARKER_RECORD_START);
        assert_eq!(&buf[1..17], &ts.to_bytes());
        assert_eq!(buf[17], MARKER_BLOCK_SIZE);
        assert_eq!(&buf[18..26], &((2 * ADDRESS_WIDTH) as u64).to_ne_bytes());
        assert_eq!(buf[26], MARKER_ADDRESSES);
        assert_eq!(&buf[27..27 + ADDRESS_WIDTH], &0x1000usize.to_ne_bytes());
        assert_eq!(buf[len - 1], MARKER_RECORD_END);
    }

    #[test]
    fn test_empty_stack_record() {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = encode_record(&mut buf, Timestamp::default(), &[]).unwrap();
        assert_eq!(len, RECORD_PREFIX_LEN + RECORD_SUFFIX_LEN);
        assert_eq!(&buf[18..26], &0u64.to_ne_bytes());
    }

    #[test]
    fn test_buffer_too_small_writes_nothing() {
        let mut buf = [0xeeu8; 16];
        let err = encode_record(&mut buf, Timestamp::default(), &[1, 2, 3]).unwrap_err();
        assert_eq!(err, EncodeError::BufferTooSmall { needed: record_len(3), available: 16 });
        assert!(buf.iter().all(|&b| b == 0xee));
    }

    #[test]
    fn test_max_record_fits_max_frames() {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let frames = [0xdead_beefusize; MAX_FRAMES];
        assert_eq!(encode_record(&mut buf, Timestamp::default(), &frames), Ok(MAX_RECORD_LEN));
    }

    #[test]
    fn test_timestamp_difference() {
        let a = Timestamp::new(1, 900_000_000);
        let b = Timestamp::new(3, 100_000_000);
        assert_eq!(b.nanos_since(a), 1_200_000_000);
        assert_eq!(a.nanos_since(b), -1_200_000_000);
    }

    #[test]
    fn test_stack_line_truncates() {
        let mut line = StackLine::<8>::new();
        write!(line, "wimps: {}", 12345).unwrap();
        assert_eq!(line.as_bytes(), b"wimps: 1");
        assert!(line.is_full());
    }
}
