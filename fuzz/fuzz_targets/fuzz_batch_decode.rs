// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fuzz target for batchlog payload decoding.
//!
//! This tests that `codec::decode` never panics on arbitrary input, and that
//! anything it accepts re-encodes to the same bytes.

#![no_main]

use batchlog_replay::codec::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mutations) = decode(data) {
        let encoded = encode(&mutations).expect("decoded batch must re-encode");
        assert_eq!(encoded, data);
    }
});
