//! # wimps-preload - In-Process Stack Sampler
//!
//! Shared object injected into the target with `LD_PRELOAD` by the `wimps`
//! launcher. Its initializer runs before the target's `main`, and from then on
//! a monotonic timer raises `SIGPROF` once per second. Each signal captures the
//! raw instruction addresses of the interrupted stack and appends one framed
//! record to this process's trace file.
//!
//! ```text
//! ┌────────────────────────────── target process ──────────────────────────────┐
//! │                                                                            │
//! │  ctor (pre-main)            timer ──SIGPROF──▶ on_sample_signal            │
//! │   ├─ warm up unwinder                           ├─ reentrancy guard        │
//! │   ├─ create trace file                          ├─ capture ≤ MAX_FRAMES    │
//! │   ├─ publish SamplerContext                     ├─ clock_gettime           │
//! │   ├─ sigaction(SIGPROF)                         ├─ encode_record           │
//! │   └─ timer_create + settime                     └─ write(2) to trace fd    │
//! │                                                                            │
//! └────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`sampler`]: initialization sequence, the signal handler, and the timer
//! - [`context`]: process-wide state, the reentrancy guard, and tick logic
//! - [`capture`]: bounded stack walking
//! - [`trace_file`]: exclusive creation of the trace file
//! - [`signal_safe`]: raw write loop and stderr diagnostics usable in a handler
//!
//! ## Features
//!
//! - `autostart`: run [`sampler::start`] from a loader constructor. Required
//!   for the preloaded library; off by default.
//!
//! ## Environment
//!
//! - `WIMPS_LOG`: log filter for initialization messages (default `warn`)

pub mod capture;
pub mod context;
pub mod errors;
pub mod sampler;
pub mod signal_safe;
pub mod trace_file;

pub use context::{RecordSink, SamplerContext, SamplerStats, TickOutcome};
pub use errors::SamplerError;

/// Entry point run by the dynamic loader before the target's `main`.
///
/// Only compiled with the `autostart` feature, which `cargo xtask
/// build-preload` enables; test binaries linking this crate never start a
/// sampler behind their own back.
#[cfg(all(feature = "autostart", not(test)))]
#[ctor::ctor]
fn wimps_preload_init() {
    // Independent of the target's own RUST_LOG
    const LOG_ENV_VAR: &str = "WIMPS_LOG";

    let _ = env_logger::Builder::from_env(env_logger::Env::new().filter_or(LOG_ENV_VAR, "warn"))
        .try_init();

    if let Err(err) = sampler::start() {
        eprintln!("wimps: {err}");
        std::process::exit(err.exit_code());
    }
}
