//! Bounded stack capture
//!
//! Instruction pointers are collected into a fixed array that lives on the
//! caller's stack. Frames past [`MAX_FRAMES`] are not captured.

#![allow(unsafe_code)] // trace_unsynchronized requires unsafe

use wimps_common::MAX_FRAMES;

/// Fixed-capacity buffer of raw instruction addresses, innermost frame first
pub struct StackBuffer {
    ips: [usize; MAX_FRAMES],
    len: usize,
}

impl StackBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self { ips: [0; MAX_FRAMES], len: 0 }
    }

    /// Append one address. Returns `false` once the buffer is full, which the
    /// unwinder callback uses as its "stop walking" signal.
    pub fn push(&mut self, ip: usize) -> bool {
        if self.len == MAX_FRAMES {
            return false;
        }
        self.ips[self.len] = ip;
        self.len += 1;
        self.len < MAX_FRAMES
    }

    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.ips[..self.len]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for StackBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the current thread's stack into `buf`.
///
/// Safe to call from the sampling signal handler once [`warm_up`] has run:
/// the unwinder itself does not allocate, but its first use may trigger lazy
/// symbol binding in the dynamic loader.
pub fn capture_current_stack(buf: &mut StackBuffer) {
    // SAFETY: the sampler only walks the stack from its own signal handler,
    // which the reentrancy guard keeps to one invocation at a time, or from
    // initialization before the handler is installed.
    unsafe {
        backtrace::trace_unsynchronized(|frame| {
            // The walk ends on a null frame; it is not part of the stack.
            let ip = frame.ip() as usize;
            ip != 0 && buf.push(ip)
        });
    }
}

/// Run one throwaway capture outside of signal context so the unwinder's
/// code and data are resolved before the first tick.
pub fn warm_up() -> usize {
    let mut scratch = StackBuffer::new();
    capture_current_stack(&mut scratch);
    scratch.len()
}
