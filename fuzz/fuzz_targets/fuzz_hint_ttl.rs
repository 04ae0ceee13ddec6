// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fuzz target for hint TTL decay.
//!
//! This tests that `decayed_ttl` never panics (no overflow) and never
//! exceeds the base TTL for entries written in the past.

#![no_main]

use batchlog_replay::ttl::decayed_ttl;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (i64, i64, i64)| {
    let (base, written_at, now) = data;

    let ttl = decayed_ttl(base, written_at, now);
    if base >= 0 && now >= written_at && base <= i64::MAX / 1000 {
        assert!(ttl <= base);
    }
});
