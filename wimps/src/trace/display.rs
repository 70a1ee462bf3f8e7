//! Rendering parsed samples
//!
//! Text for people, JSON lines for symbolization tools downstream.

use std::fmt;
use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{Sample, Trace};

/// One sample as a JSON line
#[derive(Debug, Serialize)]
struct JsonSample {
    /// Position in the trace file
    index: usize,
    /// Monotonic clock seconds
    seconds: i64,
    /// Monotonic clock nanoseconds
    nanoseconds: i64,
    /// Innermost frame first, as `0x`-prefixed hex
    addresses: Vec<String>,
}

impl JsonSample {
    fn new(index: usize, sample: &Sample) -> Self {
        Self {
            index,
            seconds: sample.timestamp.seconds,
            nanoseconds: sample.timestamp.nanoseconds,
            addresses: sample.addresses.iter().map(|addr| format!("{addr:#x}")).collect(),
        }
    }
}

/// Write a header line per sample followed by one indented address per line.
///
/// # Errors
/// Propagates write failures.
pub fn write_text<W: Write>(out: &mut W, samples: &[Sample]) -> io::Result<()> {
    for (index, sample) in samples.iter().enumerate() {
        writeln!(out, "[{index}] {} ({} frames)", sample.timestamp, sample.depth())?;
        for addr in &sample.addresses {
            writeln!(out, "    {addr:#018x}")?;
        }
    }
    Ok(())
}

/// Write one JSON object per sample, one per line.
///
/// # Errors
/// Propagates write and serialization failures.
pub fn write_json_lines<W: Write>(out: &mut W, samples: &[Sample]) -> io::Result<()> {
    for (index, sample) in samples.iter().enumerate() {
        serde_json::to_writer(&mut *out, &JsonSample::new(index, sample))?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Aggregate figures for a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub samples: usize,
    pub span_nanos: i128,
    pub max_depth: usize,
    pub total_frames: usize,
}

impl Summary {
    #[must_use]
    pub fn of(trace: &Trace) -> Self {
        Self {
            samples: trace.len(),
            span_nanos: trace.span_nanos().unwrap_or(0),
            max_depth: trace.max_depth(),
            total_frames: trace.iter().map(Sample::depth).sum(),
        }
    }

    /// Mean frames per sample
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_depth(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_frames as f64 / self.samples as f64
        }
    }
}

impl fmt::Display for Summary {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples:    {}", self.samples)?;
        writeln!(f, "span:       {:.3}s", self.span_nanos as f64 / 1e9)?;
        writeln!(f, "max depth:  {}", self.max_depth)?;
        write!(f, "mean depth: {:.1}", self.mean_depth())
    }
}
