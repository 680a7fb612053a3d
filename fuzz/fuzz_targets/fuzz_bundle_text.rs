//! Fuzz target for the base64 transfer wrapper.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rrdp_bundle::{decode_text, encode_text};

fuzz_target!(|data: &str| {
    if let Ok(bytes) = decode_text(data) {
        let round = decode_text(&encode_text(&bytes)).expect("own encoding must decode");
        assert_eq!(round, bytes);
    }
});
