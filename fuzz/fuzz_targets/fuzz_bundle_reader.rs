//! Fuzz target for export bundle reading.
//!
//! Tests that bundle parsing handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rrdp_bundle::BundleReader;

fuzz_target!(|data: &[u8]| {
    // Most random data fails the ZIP directory check quickly
    if let Ok(mut reader) = BundleReader::from_bytes(data.to_vec()) {
        let _ = reader.read_all();
    }
});
