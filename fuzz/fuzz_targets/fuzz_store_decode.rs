//! Fuzz target for store file decoding.
//!
//! Imported store files come from outside; decoding must reject garbage
//! without panicking, and anything it accepts must re-encode to the same
//! bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rrdp_format::{decode, encode};

fuzz_target!(|data: &[u8]| {
    if let Ok(store) = decode(data) {
        let bytes = encode(&store);
        let again = decode(&bytes).expect("re-encoded store must decode");
        assert_eq!(encode(&again), bytes);
    }
});
