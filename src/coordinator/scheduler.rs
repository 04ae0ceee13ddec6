// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Periodic replay task.
//!
//! The first cycle fires after the ring delay, giving gossip time to settle
//! liveness and ring state after startup, then every `replay_interval`.
//! A cycle that overruns the interval delays the next tick rather than
//! triggering a burst.

use super::replay::ReplayCore;
use super::types::CycleOutcome;
use crate::error::Result;
use crate::metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Instrument};

/// Run the replay scheduler until shutdown is signaled.
pub(crate) async fn run_scheduler(
    core: Arc<ReplayCore>,
    initial_delay: Duration,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let span = tracing::info_span!("batchlog_scheduler");

    async move {
        // Mark initial shutdown value as seen so changed() only fires on actual changes
        let _ = shutdown_rx.borrow_and_update();

        info!(
            initial_delay_ms = initial_delay.as_millis(),
            interval_secs = interval.as_secs(),
            "Starting batchlog replay scheduler"
        );

        let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + initial_delay, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping replay scheduler");
                        break;
                    }
                    continue;
                }

                _ = timer.tick() => {}
            }

            let _ = run_and_record(&core, "scheduled").await;
        }

        info!("Batchlog replay scheduler stopped");
    }
    .instrument(span)
    .await
}

/// Run one cycle and report its outcome to logs and metrics.
///
/// `trigger` is "scheduled", "forced", or "manual".
pub(crate) async fn run_and_record(core: &ReplayCore, trigger: &'static str) -> Result<CycleOutcome> {
    let start = Instant::now();
    let result = core.run_cycle().await;
    let duration = start.elapsed();

    match &result {
        Ok(CycleOutcome::Skipped) => {
            debug!(trigger, "Replay cycle skipped, another cycle is running");
            metrics::record_cycle("skipped", duration);
        }
        Ok(CycleOutcome::Completed(stats)) => {
            metrics::record_cycle("completed", duration);
            if stats.batches_replayed > 0 {
                info!(
                    trigger,
                    batches_replayed = stats.batches_replayed,
                    decode_failures = stats.decode_failures,
                    rpcs_sent = stats.rpcs_sent,
                    delivery_timeouts = stats.delivery_timeouts,
                    hints_written = stats.hints_written,
                    duration_ms = duration.as_millis(),
                    "Replay cycle complete"
                );
            } else {
                debug!(
                    trigger,
                    entries_scanned = stats.entries_scanned,
                    entries_too_young = stats.entries_too_young,
                    "Replay cycle complete, nothing to replay"
                );
            }
        }
        Err(e) => {
            warn!(
                trigger,
                error = %e,
                retryable = e.is_retryable(),
                duration_ms = duration.as_millis(),
                "Replay cycle failed"
            );
            metrics::record_error(e.kind());
            metrics::record_cycle("failed", duration);
        }
    }

    match core.pending_count().await {
        Ok(count) => metrics::set_pending_batches(count),
        Err(e) => debug!(error = %e, "Could not count pending batches"),
    }

    result
}
