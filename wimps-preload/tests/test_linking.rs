//! Linking the library must not start sampling unless `autostart` is on.
#![cfg(not(feature = "autostart"))]

use wimps_common::TRACE_MARKER_V1;

#[test]
fn test_linking_does_not_start_sampler() {
    assert!(wimps_preload::sampler::context().is_none());

    // Integration tests run from the package directory
    let stray: Vec<_> = std::fs::read_dir(env!("CARGO_MANIFEST_DIR"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(TRACE_MARKER_V1))
        .collect();
    assert!(stray.is_empty(), "{stray:?}");
}
