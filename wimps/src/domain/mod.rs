//! Domain model for wimps
//!
//! This module contains core domain types and errors that provide:
//! - Owned, independently stored samples
//! - Structured error handling with stable exit codes

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{Sample, Trace};
pub use wimps_common::Timestamp;

pub use errors::{OpenError, ReadError, RecordStage, SupervisorError, TraceError};
