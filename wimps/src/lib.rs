//! # wimps - Ptrace-Supervised Sampling Profiler
//!
//! wimps runs a program with a small sampler library preloaded into it. The
//! sampler records the raw call stack once per second into a trace file; this
//! crate launches and supervises the program and reads those traces back.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐   fork + PTRACE_TRACEME   ┌──────────────────────────┐
//! │  wimps (supervisor)      │──────────────────────────▶│  target process          │
//! │                          │   execve, LD_PRELOAD=...  │   + libwimps_preload.so  │
//! │  waitpid loop            │◀──── stop(signal) ────────│                          │
//! │   SIGINT, SIGPROF: relay │───── PTRACE_CONT(sig) ───▶│   SIGPROF ─▶ sample      │
//! │   other: suppress        │                           │        │                 │
//! └──────────────────────────┘                           └────────┼─────────────────┘
//!                                                                 │ append records
//!                                                                 ▼
//!                                                  _wimps_trace_v1_pid<P>_time<T>_<exe>_
//!                                                                 │
//!                                                                 ▼
//!                                                  wimps-read (trace reader)
//! ```
//!
//! ## Module Organization
//!
//! - [`supervisor`]: exec preparation, the traced child, and the control loop
//! - [`trace`]: streaming reader and output formats for trace files
//! - [`domain`]: samples, traces, and error types with stable exit codes
//! - [`cli`]: command-line arguments for both binaries
//!
//! ## Wire Format
//!
//! After the `_wimps_trace_v1\n` header, each record is
//! `'a' | ts(16) | 'b' | size(8) | 'c' | addresses(size) | 'd'`, host-endian.
//! See [`wimps_common`] for the constants and the encoder.

pub mod cli;
pub mod domain;
pub mod supervisor;
pub mod trace;
