//! Trace data model
//!
//! A [`Trace`] owns its samples and each [`Sample`] owns its addresses, so
//! appending to a trace never invalidates samples handed out earlier.

use wimps_common::Timestamp;

/// One stack capture
///
/// `addresses` are raw instruction pointers in the order the unwinder produced
/// them (innermost frame first). The order is preserved exactly; symbolization
/// happens in a later stage and depends on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub addresses: Vec<usize>,
}

impl Sample {
    #[must_use]
    pub fn new(timestamp: Timestamp, addresses: Vec<usize>) -> Self {
        Self { timestamp, addresses }
    }

    /// Number of captured frames
    #[must_use]
    pub fn depth(&self) -> usize {
        self.addresses.len()
    }
}

/// All samples of one profiling run, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    pub samples: Vec<Sample>,
}

impl Trace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Time between the first and last sample, in nanoseconds
    #[must_use]
    pub fn span_nanos(&self) -> Option<i128> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some(last.timestamp.nanos_since(first.timestamp))
    }

    /// Deepest captured stack
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.samples.iter().map(Sample::depth).max().unwrap_or(0)
    }
}

impl From<Vec<Sample>> for Trace {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
