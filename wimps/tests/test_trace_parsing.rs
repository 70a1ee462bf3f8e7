use std::io::Write;

use wimps::domain::{ReadError, RecordStage, Sample, Timestamp};
use wimps::trace::{self, read_trace, TraceReader};
use wimps_common::{
    encode_record, exit, record_len, ADDRESS_WIDTH, MARKER_ADDRESSES, MARKER_BLOCK_SIZE,
    MARKER_RECORD_END, MARKER_RECORD_START, RECORD_PREFIX_LEN, TIMESTAMP_LEN, TRACE_HEADER_V1,
};

fn sample(i: usize) -> Sample {
    let addresses = (0..i % 5).map(|frame| 0x5555_0000 + i * 0x100 + frame).collect();
    Sample::new(Timestamp::new(100 + i as i64, (i as i64 * 37_000_001) % 1_000_000_000), addresses)
}

fn encode(samples: &[Sample]) -> (Vec<u8>, Vec<usize>) {
    let mut bytes = TRACE_HEADER_V1.to_vec();
    let mut starts = Vec::new();
    for s in samples {
        starts.push(bytes.len());
        let mut buf = vec![0u8; record_len(s.addresses.len())];
        let len = encode_record(&mut buf, s.timestamp, &s.addresses).unwrap();
        bytes.extend_from_slice(&buf[..len]);
    }
    (bytes, starts)
}

#[test]
fn test_round_trip_through_file() {
    for n in [0, 1, 2, 7, 50] {
        let samples: Vec<Sample> = (0..n).map(sample).collect();
        let (bytes, _) = encode(&samples);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let trace = read_trace(trace::open(file.path()).unwrap()).unwrap();
        assert_eq!(trace.samples, samples, "round trip of {n} samples");
    }
}

#[test]
fn test_truncation_inside_a_record_is_never_silent() {
    let samples: Vec<Sample> = (0..4).map(sample).collect();
    let (bytes, starts) = encode(&samples);

    for cut in TRACE_HEADER_V1.len()..bytes.len() {
        let result = read_trace(&bytes[..cut]);
        if starts.contains(&cut) {
            let trace = result.unwrap();
            let whole = starts.iter().position(|&s| s == cut).unwrap();
            assert_eq!(trace.len(), whole, "cut at record boundary {cut}");
        } else {
            let err = result.unwrap_err();
            assert!(
                matches!(err.error, ReadError::UnexpectedEof { .. }),
                "cut at {cut}: {}",
                err.error
            );
            assert_eq!(err.exit_code(), exit::EOF);
            let record = err.error.record().unwrap();
            assert_eq!(err.recovered.samples, samples[..record]);
        }
    }
}

#[test]
fn test_marker_corruption_reports_exact_record() {
    let samples: Vec<Sample> = (0..5).map(sample).collect();
    let (bytes, starts) = encode(&samples);

    for (record, &start) in starts.iter().enumerate() {
        let frames = samples[record].addresses.len();
        let markers = [
            (start, RecordStage::RecordStart, MARKER_RECORD_START),
            (start + 1 + TIMESTAMP_LEN, RecordStage::SizeMarker, MARKER_BLOCK_SIZE),
            (start + RECORD_PREFIX_LEN - 1, RecordStage::AddressMarker, MARKER_ADDRESSES),
            (
                start + RECORD_PREFIX_LEN + frames * ADDRESS_WIDTH,
                RecordStage::RecordEnd,
                MARKER_RECORD_END,
            ),
        ];

        for (offset, stage, marker) in markers {
            assert_eq!(bytes[offset], marker);
            let mut corrupt = bytes.clone();
            corrupt[offset] ^= 0x20;

            let err = read_trace(corrupt.as_slice()).unwrap_err();
            match err.error {
                ReadError::BadMarker { record: r, stage: s, expected, found } => {
                    assert_eq!((r, s), (record, stage));
                    assert_eq!(expected, char::from(marker));
                    assert_eq!(found, marker ^ 0x20);
                }
                ref other => panic!("record {record} {stage}: unexpected {other}"),
            }
            assert_eq!(err.exit_code(), exit::BAD_MARKER);
            assert_eq!(err.recovered.samples, samples[..record]);
        }
    }
}

#[test]
fn test_header_must_match_exactly() {
    let (good, _) = encode(&[sample(1)]);
    for header in [&b"_wimps_trace_v2\n"[..], b"_wimps_trace_v1 \n", b"", b"\n", b"_wimps_trace_v"] {
        let mut bytes = header.to_vec();
        bytes.extend_from_slice(&good[TRACE_HEADER_V1.len()..]);

        let err = read_trace(bytes.as_slice()).unwrap_err();
        assert!(matches!(err.error, ReadError::UnknownFormat { .. }), "{header:?}");
        assert!(err.recovered.is_empty());
        assert_eq!(err.exit_code(), exit::UNKNOWN_FORMAT);
    }
}

#[test]
fn test_misaligned_address_block_is_rejected() {
    let mut bytes = TRACE_HEADER_V1.to_vec();
    bytes.push(MARKER_RECORD_START);
    bytes.extend_from_slice(&Timestamp::new(1, 2).to_bytes());
    bytes.push(MARKER_BLOCK_SIZE);
    bytes.extend_from_slice(&(ADDRESS_WIDTH as u64 + 3).to_ne_bytes());
    bytes.push(MARKER_ADDRESSES);
    bytes.extend_from_slice(&vec![0u8; ADDRESS_WIDTH + 3]);
    bytes.push(MARKER_RECORD_END);

    let err = read_trace(bytes.as_slice()).unwrap_err();
    assert!(matches!(
        err.error,
        ReadError::MisalignedAddressBlock { record: 0, width: ADDRESS_WIDTH, .. }
    ));
}

#[test]
fn test_streaming_reader_matches_whole_read() {
    let samples: Vec<Sample> = (0..9).map(sample).collect();
    let (bytes, _) = encode(&samples);

    let streamed: Vec<Sample> =
        TraceReader::new(bytes.as_slice()).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(streamed, samples);
}

#[test]
fn test_open_missing_file_is_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = trace::open(&dir.path().join("missing")).unwrap_err();
    assert_eq!(err.exit_code(), exit::BAD_FILE);
}
