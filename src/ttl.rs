// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Hint TTL arithmetic.
//!
//! A replayed mutation is only safe while its hint TTL has not decayed to
//! zero. The base TTL is the smallest gc grace period of the tables the
//! mutation touches: once that much time has passed since the batch was
//! logged, tombstones the mutation might be racing against can have been
//! purged, and replaying it could resurrect deleted data.
//!
//! ```text
//! effective = (base_secs * 1000 - (now_ms - written_at_ms)) / 1000
//! ```
//!
//! A result `<= 0` means: do not apply, deliver, or hint.

use crate::clock::Clock;
use crate::mutation::Mutation;
use dashmap::DashMap;
use std::sync::Arc;

/// Ten days, the default gc grace period.
pub const DEFAULT_GC_GRACE_SECONDS: i64 = 864_000;

/// Supplies the undecayed hint TTL of a mutation.
pub trait HintTtlSource: Send + Sync + 'static {
    fn base_hint_ttl(&self, mutation: &Mutation) -> i64;
}

/// Base TTL = min(max hint TTL, gc grace of every table touched).
#[derive(Debug)]
pub struct GcGraceHintTtl {
    default_gc_grace: i64,
    max_hint_ttl: i64,
    overrides: DashMap<(String, String), i64>,
}

impl Default for GcGraceHintTtl {
    fn default() -> Self {
        Self::new(DEFAULT_GC_GRACE_SECONDS, i32::MAX as i64)
    }
}

impl GcGraceHintTtl {
    pub fn new(default_gc_grace: i64, max_hint_ttl: i64) -> Self {
        Self {
            default_gc_grace,
            max_hint_ttl,
            overrides: DashMap::new(),
        }
    }

    /// Set the gc grace period of one table (schema change).
    pub fn set_gc_grace(&self, keyspace: &str, column_family: &str, seconds: i64) {
        self.overrides
            .insert((keyspace.to_string(), column_family.to_string()), seconds);
    }

    pub fn gc_grace(&self, keyspace: &str, column_family: &str) -> i64 {
        self.overrides
            .get(&(keyspace.to_string(), column_family.to_string()))
            .map(|v| *v)
            .unwrap_or(self.default_gc_grace)
    }
}

impl HintTtlSource for GcGraceHintTtl {
    fn base_hint_ttl(&self, mutation: &Mutation) -> i64 {
        mutation
            .column_families()
            .map(|cf| self.gc_grace(mutation.keyspace(), cf))
            .fold(self.max_hint_ttl, i64::min)
    }
}

/// Decay `base_secs` by the time elapsed since `written_at_ms`.
pub fn decayed_ttl(base_secs: i64, written_at_ms: i64, now_ms: i64) -> i64 {
    let elapsed_ms = now_ms.saturating_sub(written_at_ms);
    base_secs.saturating_mul(1000).saturating_sub(elapsed_ms) / 1000
}

/// Computes effective hint TTLs against a clock.
#[derive(Clone)]
pub struct HintTtlCalculator {
    source: Arc<dyn HintTtlSource>,
    clock: Arc<dyn Clock>,
}

impl HintTtlCalculator {
    pub fn new(source: Arc<dyn HintTtlSource>, clock: Arc<dyn Clock>) -> Self {
        Self { source, clock }
    }

    /// Remaining safe seconds for `mutation` logged at `written_at_ms`.
    pub fn effective_ttl(&self, mutation: &Mutation, written_at_ms: i64) -> i64 {
        decayed_ttl(
            self.source.base_hint_ttl(mutation),
            written_at_ms,
            self.clock.now_millis(),
        )
    }
}
