//! Busy workload for trying out wimps
//!
//! Alternates between two CPU-bound functions so the trace has more than one
//! hot stack.
//!
//! ## Usage
//!
//! ```bash
//! cargo xtask build-preload
//! cargo build --example busy-loop
//! cargo run --bin wimps -- ./target/debug/examples/busy-loop 10
//! cargo run --bin wimps-read -- --summary _wimps_trace_v1_pid*_busy-loop_
//! ```

use std::hint::black_box;
use std::time::{Duration, Instant};

#[inline(never)]
fn hash_rounds(rounds: u64) -> u64 {
    let mut h = 0xcbf2_9ce4_8422_2325_u64;
    for i in 0..rounds {
        h ^= i;
        h = h.wrapping_mul(0x0100_0000_01b3);
    }
    h
}

#[inline(never)]
fn count_primes(limit: u64) -> usize {
    (2..limit).filter(|&n| (2..n).take_while(|d| d * d <= n).all(|d| n % d != 0)).count()
}

fn main() {
    let seconds = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(5);
    let deadline = Instant::now() + Duration::from_secs(seconds);

    let mut rounds = 0u64;
    while Instant::now() < deadline {
        black_box(hash_rounds(black_box(5_000_000)));
        black_box(count_primes(black_box(20_000)));
        rounds += 1;
    }
    println!("busy-loop: {rounds} rounds in {seconds}s");
}
