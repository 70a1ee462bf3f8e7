//! Streaming trace reader
//!
//! Records carry no resynchronization point, so the first structural error
//! ends the stream: [`TraceReader`] yields it once and then stops.

use std::io::{self, BufRead, Read};

use wimps_common::{
    Timestamp, ADDRESS_WIDTH, BLOCK_SIZE_LEN, MARKER_ADDRESSES, MARKER_BLOCK_SIZE,
    MARKER_RECORD_END, MARKER_RECORD_START, TIMESTAMP_LEN, TRACE_HEADER_V1, TRACE_MARKER_V1,
};

use crate::domain::{ReadError, RecordStage, Sample, Trace, TraceError};

/// Longest header line examined before giving up on the format
const MAX_HEADER_LEN: u64 = 4096;

/// Addresses reserved per allocation step while filling a sample
const ADDRESS_CHUNK: usize = 4096;

/// Reads samples one record at a time
pub struct TraceReader<R> {
    inner: R,
    record: usize,
    finished: bool,
}

impl<R: BufRead> TraceReader<R> {
    /// Validate the header line and position the reader at the first record.
    ///
    /// # Errors
    /// [`ReadError::UnknownFormat`] unless the first line is exactly the v1
    /// marker; [`ReadError::Io`] on read failures.
    pub fn new(mut inner: R) -> Result<Self, ReadError> {
        let mut line = Vec::new();
        (&mut inner).take(MAX_HEADER_LEN).read_until(b'\n', &mut line)?;

        if line != TRACE_HEADER_V1 {
            let found = line.strip_suffix(b"\n").unwrap_or(&line);
            return Err(ReadError::UnknownFormat {
                expected: TRACE_MARKER_V1,
                found: String::from_utf8_lossy(found).into_owned(),
            });
        }

        Ok(Self { inner, record: 0, finished: false })
    }

    /// Records successfully decoded so far
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.record
    }

    /// Decode the next record, or `None` at a clean end of file.
    ///
    /// End of file is only clean where a record would start.
    ///
    /// # Errors
    /// Any marker mismatch, short read, misaligned address block, or failed
    /// allocation inside the record.
    pub fn next_sample(&mut self) -> Result<Option<Sample>, ReadError> {
        if self.at_eof()? {
            return Ok(None);
        }

        self.expect_marker(RecordStage::RecordStart, MARKER_RECORD_START)?;

        let mut ts = [0u8; TIMESTAMP_LEN];
        self.read_field(&mut ts, RecordStage::Timestamp)?;
        let timestamp = Timestamp::from_bytes(ts);

        self.expect_marker(RecordStage::SizeMarker, MARKER_BLOCK_SIZE)?;

        let mut size = [0u8; BLOCK_SIZE_LEN];
        self.read_field(&mut size, RecordStage::BlockSize)?;
        let size = u64::from_ne_bytes(size);
        if size % ADDRESS_WIDTH as u64 != 0 {
            return Err(ReadError::MisalignedAddressBlock {
                record: self.record,
                size,
                width: ADDRESS_WIDTH,
            });
        }

        self.expect_marker(RecordStage::AddressMarker, MARKER_ADDRESSES)?;
        let addresses = self.read_addresses(size)?;
        self.expect_marker(RecordStage::RecordEnd, MARKER_RECORD_END)?;

        self.record += 1;
        Ok(Some(Sample::new(timestamp, addresses)))
    }

    fn at_eof(&mut self) -> Result<bool, ReadError> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.is_empty()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn read_field(&mut self, buf: &mut [u8], stage: RecordStage) -> Result<(), ReadError> {
        self.inner.read_exact(buf).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                ReadError::UnexpectedEof { record: self.record, stage }
            } else {
                ReadError::Io(err)
            }
        })
    }

    fn expect_marker(&mut self, stage: RecordStage, expected: u8) -> Result<(), ReadError> {
        let mut found = [0u8; 1];
        self.read_field(&mut found, stage)?;
        if found[0] == expected {
            Ok(())
        } else {
            Err(ReadError::BadMarker {
                record: self.record,
                stage,
                expected: char::from(expected),
                found: found[0],
            })
        }
    }

    /// Read exactly `size` bytes of addresses, growing the buffer in bounded
    /// steps so a corrupt size fails on EOF rather than on one huge
    /// allocation.
    fn read_addresses(&mut self, size: u64) -> Result<Vec<usize>, ReadError> {
        let alloc_error = ReadError::Alloc { record: self.record, size };
        let count = usize::try_from(size / ADDRESS_WIDTH as u64).map_err(|_| alloc_error)?;

        let mut addresses: Vec<usize> = Vec::new();
        let mut word = [0u8; ADDRESS_WIDTH];
        for _ in 0..count {
            if addresses.len() == addresses.capacity() {
                let step = (count - addresses.len()).min(ADDRESS_CHUNK);
                addresses
                    .try_reserve_exact(step)
                    .map_err(|_| ReadError::Alloc { record: self.record, size })?;
            }
            self.read_field(&mut word, RecordStage::AddressBlock)?;
            addresses.push(usize::from_ne_bytes(word));
        }
        Ok(addresses)
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<Sample, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_sample() {
            Ok(Some(sample)) => Some(Ok(sample)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for TraceReader<R> {}

/// Read a whole trace.
///
/// # Errors
/// A [`TraceError`] carrying the failure and every sample decoded before it.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Trace, TraceError> {
    let mut trace = Trace::new();

    let records = match TraceReader::new(reader) {
        Ok(records) => records,
        Err(error) => return Err(TraceError { error, recovered: trace }),
    };

    for (record, sample) in records.enumerate() {
        let sample = match sample {
            Ok(sample) => sample,
            Err(error) => return Err(TraceError { error, recovered: trace }),
        };
        if trace.samples.try_reserve(1).is_err() {
            let size = ((trace.len() + 1) * std::mem::size_of::<Sample>()) as u64;
            return Err(TraceError { error: ReadError::Alloc { record, size }, recovered: trace });
        }
        trace.push(sample);
    }

    Ok(trace)
}
