//! Trace file reading and rendering
//!
//! - `reader`: header validation and record decoding
//! - `display`: text, JSON lines and summary output

pub mod display;
pub mod reader;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::domain::OpenError;

pub use display::{write_json_lines, write_text, Summary};
pub use reader::{read_trace, TraceReader};

/// Open a trace file for buffered reading.
///
/// # Errors
/// [`OpenError`] if the file cannot be opened.
pub fn open(path: &Path) -> Result<BufReader<File>, OpenError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| OpenError { path: path.to_path_buf(), source })
}
