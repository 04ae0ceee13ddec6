// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Replay cycle outcomes and duration
//! - Batches replayed, missing, and undecodable
//! - Direct delivery (RPCs, timeouts, failures)
//! - Hint fallback
//! - Batchlog cleanup (flush + compaction)
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `batchlog_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! # Usage
//!
//! ```rust,no_run
//! use batchlog_replay::metrics;
//! use std::time::Duration;
//!
//! metrics::record_batch_replayed();
//! metrics::record_cycle("completed", Duration::from_millis(120));
//! ```

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the outcome of one `run_cycle()` call ("completed", "skipped", "failed").
pub fn record_cycle(outcome: &str, duration: Duration) {
    counter!("batchlog_cycles_total", "outcome" => outcome.to_string()).increment(1);
    if outcome != "skipped" {
        histogram!("batchlog_cycle_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Record the scan results of a completed cycle.
pub fn record_scan(entries_scanned: usize, entries_too_young: usize, entries_missing: usize) {
    counter!("batchlog_entries_scanned_total").increment(entries_scanned as u64);
    counter!("batchlog_entries_too_young_total").increment(entries_too_young as u64);
    if entries_missing > 0 {
        counter!("batchlog_entries_missing_total").increment(entries_missing as u64);
    }
}

/// Record one batch replayed and deleted.
pub fn record_batch_replayed() {
    counter!("batchlog_batches_replayed_total").increment(1);
}

/// Record a batch whose payload could not be decoded (deleted anyway).
pub fn record_batch_decode_failure() {
    counter!("batchlog_decode_failures_total").increment(1);
}

/// Record a mutation that was not replayed ("ttl_expired").
pub fn record_mutation_skipped(reason: &str) {
    counter!("batchlog_mutations_skipped_total", "reason" => reason.to_string()).increment(1);
}

/// Record a mutation applied directly to local storage.
pub fn record_local_apply() {
    counter!("batchlog_local_applies_total").increment(1);
}

/// Record mutation RPCs dispatched for direct delivery.
pub fn record_delivery_sent(count: usize) {
    counter!("batchlog_delivery_sent_total").increment(count as u64);
}

/// Record a direct delivery outcome ("success", "timeout", "failure").
pub fn record_delivery_outcome(outcome: &str) {
    counter!("batchlog_delivery_outcomes_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record hints written, by reason ("endpoint_down", "undelivered").
pub fn record_hints_written(reason: &str, count: usize) {
    if count > 0 {
        counter!("batchlog_hints_written_total", "reason" => reason.to_string())
            .increment(count as u64);
    }
}

/// Record undelivered endpoints dropped because the TTL expired during delivery.
pub fn record_hints_dropped(count: usize) {
    if count > 0 {
        counter!("batchlog_hints_dropped_total").increment(count as u64);
    }
}

/// Record a batchlog cleanup (flush + optional compaction).
pub fn record_cleanup(segments_compacted: usize, duration: Duration) {
    counter!("batchlog_cleanups_total").increment(1);
    if segments_compacted > 0 {
        counter!("batchlog_segments_compacted_total").increment(segments_compacted as u64);
    }
    histogram!("batchlog_cleanup_duration_seconds").record(duration.as_secs_f64());
}

/// Record errors by type.
pub fn record_error(error_type: &str) {
    counter!("batchlog_errors_total", "error_type" => error_type.to_string()).increment(1);
}

/// Gauge for entries currently in the batchlog.
pub fn set_pending_batches(count: u64) {
    gauge!("batchlog_pending_batches").set(count as f64);
}

/// Gauge for whether a replay cycle is executing (0/1).
pub fn set_replaying(replaying: bool) {
    gauge!("batchlog_replaying").set(if replaying { 1.0 } else { 0.0 });
}

/// Gauge for engine state.
pub fn set_engine_state(state: &str) {
    let value = match state {
        "Created" => 0.0,
        "Running" => 1.0,
        "ShuttingDown" => 2.0,
        "Stopped" => 3.0,
        "Failed" => 4.0,
        _ => -1.0,
    };
    gauge!("batchlog_engine_state").set(value);
}
