// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replay of failed batches.
//!
//! A cycle scans the batchlog, replays every entry older than the replay
//! timeout, deletes it, and finishes with a cleanup pass.
//!
//! # Per-Mutation Routing
//!
//! ```text
//!                    effective ttl <= 0 ──→ skip (no apply, RPC, or hint)
//!                            │
//!          natural ∪ pending endpoints
//!          ┌─────────────────┼──────────────────┐
//!          ↓                 ↓                  ↓
//!        local             alive               dead
//!     storage.apply    direct delivery    hint(ttl) now
//!                            │
//!              wait until dispatch + write timeout
//!                            │
//!           still undelivered + ttl > 0 ──→ hint(ttl)
//! ```
//!
//! Entries are deleted after replay whether or not every replica
//! acknowledged: the hint fallback owns the remaining delivery. Undecodable
//! entries are deleted too, with a warning.
//!
//! # Single Flight
//!
//! At most one cycle runs at a time. `run_cycle()` claims the replaying flag
//! with a compare-and-swap and returns [`CycleOutcome::Skipped`] if it is
//! already held. The flag is released by a guard on every exit path,
//! including errors and cancellation of the cycle future.

use super::cleanup;
use super::types::{CycleOutcome, ReplayStats};
use super::ReplayServices;
use crate::clock::{Clock, SystemClock};
use crate::cluster::{Endpoint, FailureDetector, HintStore, MessagingService, Topology};
use crate::codec;
use crate::config::BatchlogConfig;
use crate::error::{ReplayError, Result};
use crate::metrics;
use crate::mutation::Mutation;
use crate::store::{BatchlogStore, LocalStorage};
use crate::ttl::{GcGraceHintTtl, HintTtlCalculator, HintTtlSource};
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

/// Releases the replaying flag when dropped.
struct ReplayingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ReplayingGuard<'a> {
    /// Claim the flag, or `None` if a cycle already holds it.
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        metrics::set_replaying(true);
        Some(Self { flag })
    }
}

impl Drop for ReplayingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        metrics::set_replaying(false);
    }
}

/// State shared by the scheduler, forced replays, and the admin handle.
pub(crate) struct ReplayCore {
    local_endpoint: Endpoint,
    write_rpc_timeout: Duration,
    replay_timeout_ms: i64,
    store: Arc<dyn BatchlogStore>,
    storage: Arc<dyn LocalStorage>,
    topology: Arc<dyn Topology>,
    failure_detector: Arc<dyn FailureDetector>,
    messaging: Arc<dyn MessagingService>,
    hints: Arc<dyn HintStore>,
    ttl: HintTtlCalculator,
    clock: Arc<dyn Clock>,
    replaying: AtomicBool,
    total_replayed: AtomicU64,
}

impl ReplayCore {
    pub(crate) fn new(config: &BatchlogConfig, services: ReplayServices) -> Self {
        let clock: Arc<dyn Clock> = services.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let source: Arc<dyn HintTtlSource> = services.hint_ttl.unwrap_or_else(|| {
            Arc::new(GcGraceHintTtl::new(
                config.hints.default_gc_grace_sec,
                config.hints.max_hint_ttl_sec,
            ))
        });

        Self {
            local_endpoint: config.local_endpoint,
            write_rpc_timeout: config.settings.write_rpc_timeout(),
            replay_timeout_ms: config.settings.replay_timeout().as_millis() as i64,
            store: services.store,
            storage: services.storage,
            topology: services.topology,
            failure_detector: services.failure_detector,
            messaging: services.messaging,
            hints: services.hints,
            ttl: HintTtlCalculator::new(source, Arc::clone(&clock)),
            clock,
            replaying: AtomicBool::new(false),
            total_replayed: AtomicU64::new(0),
        }
    }

    pub(crate) fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::Acquire)
    }

    pub(crate) fn total_replayed(&self) -> u64 {
        self.total_replayed.load(Ordering::SeqCst)
    }

    pub(crate) async fn pending_count(&self) -> Result<u64> {
        self.store.count().await
    }

    /// Run one full cycle unless another is already running.
    pub(crate) async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Some(_guard) = ReplayingGuard::try_acquire(&self.replaying) else {
            debug!("Replay already in progress, skipping cycle");
            return Ok(CycleOutcome::Skipped);
        };

        let stats = self.replay_all_failed_batches().await?;
        Ok(CycleOutcome::Completed(stats))
    }

    #[instrument(skip_all)]
    async fn replay_all_failed_batches(&self) -> Result<ReplayStats> {
        debug!("Started replay of failed batches");
        let mut stats = ReplayStats::default();

        let summaries = self.store.list_all().await?;
        stats.entries_scanned = summaries.len();

        for summary in summaries {
            if summary.is_stale(self.clock.now_millis(), self.replay_timeout_ms) {
                self.replay_entry(summary.id, &mut stats).await?;
            } else {
                stats.entries_too_young += 1;
            }
        }

        let cleaned = cleanup::cleanup(self.storage.as_ref()).await?;
        stats.segments_compacted = cleaned.segments_compacted;

        metrics::record_scan(
            stats.entries_scanned,
            stats.entries_too_young,
            stats.entries_missing,
        );
        debug!(
            entries_scanned = stats.entries_scanned,
            batches_replayed = stats.batches_replayed,
            "Finished replay of failed batches"
        );

        Ok(stats)
    }

    #[instrument(skip_all, fields(batch_id = %id))]
    async fn replay_entry(&self, id: Uuid, stats: &mut ReplayStats) -> Result<()> {
        let Some(entry) = self.store.get(id).await? else {
            debug!("Batch deleted since scan, skipping");
            stats.entries_missing += 1;
            return Ok(());
        };

        debug!(written_at = entry.written_at, "Replaying batch");

        match codec::decode(&entry.payload) {
            Ok(mutations) => {
                for mutation in mutations {
                    self.replay_mutation(mutation, entry.written_at, stats).await?;
                }
            }
            Err(e) => {
                warn!(error = %e, "Skipped batch replay due to undecodable payload");
                stats.decode_failures += 1;
                metrics::record_batch_decode_failure();
            }
        }

        self.store.delete(id).await?;
        self.total_replayed.fetch_add(1, Ordering::SeqCst);
        stats.batches_replayed += 1;
        metrics::record_batch_replayed();

        Ok(())
    }

    async fn replay_mutation(
        &self,
        mutation: Mutation,
        written_at: i64,
        stats: &mut ReplayStats,
    ) -> Result<()> {
        let ttl = self.ttl.effective_ttl(&mutation, written_at);
        if ttl <= 0 {
            debug!(
                keyspace = mutation.keyspace(),
                ttl, "Hint TTL expired, not replaying mutation"
            );
            stats.mutations_expired += 1;
            metrics::record_mutation_skipped("ttl_expired");
            return Ok(());
        }
        stats.mutations_replayed += 1;

        let mut live = Vec::new();
        let mut hinted = 0;

        for endpoint in self.topology.write_endpoints(mutation.keyspace(), mutation.key()) {
            if endpoint == self.local_endpoint {
                self.storage.apply(&mutation).await?;
                stats.local_applies += 1;
                metrics::record_local_apply();
            } else if self.failure_detector.is_alive(&endpoint) {
                live.push(endpoint);
            } else {
                trace!(endpoint = %endpoint, ttl, "Replica down, writing hint");
                self.hints.write_hint(&mutation, ttl, endpoint).await?;
                hinted += 1;
            }
        }

        stats.hints_written += hinted;
        metrics::record_hints_written("endpoint_down", hinted);

        if !live.is_empty() {
            self.attempt_direct_delivery(Arc::new(mutation), written_at, live, stats)
                .await?;
        }

        Ok(())
    }

    /// Send `mutation` to every live replica and hint the ones that do not
    /// acknowledge before `dispatch + write_rpc_timeout`.
    async fn attempt_direct_delivery(
        &self,
        mutation: Arc<Mutation>,
        written_at: i64,
        endpoints: Vec<Endpoint>,
        stats: &mut ReplayStats,
    ) -> Result<()> {
        let undelivered: Arc<DashSet<Endpoint>> = Arc::new(endpoints.iter().copied().collect());
        let deadline = tokio::time::Instant::now() + self.write_rpc_timeout;

        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|endpoint| {
                let send = self.messaging.send_mutation(Arc::clone(&mutation), endpoint);
                let undelivered = Arc::clone(&undelivered);
                let handle = tokio::spawn(async move {
                    let result = send.await;
                    if result.is_ok() {
                        undelivered.remove(&endpoint);
                    }
                    result
                });
                (endpoint, handle)
            })
            .collect();

        stats.rpcs_sent += handles.len();
        metrics::record_delivery_sent(handles.len());

        // All waits share one deadline; timed-out requests are aborted locally.
        let outcomes = futures::future::join_all(handles.into_iter().map(
            |(endpoint, mut handle)| async move {
                let outcome = tokio::time::timeout_at(deadline, &mut handle).await;
                if outcome.is_err() {
                    handle.abort();
                }
                (endpoint, outcome)
            },
        ))
        .await;

        for (endpoint, outcome) in outcomes {
            match outcome {
                Ok(Ok(Ok(()))) => {
                    metrics::record_delivery_outcome("success");
                }
                Ok(Ok(Err(e))) => {
                    debug!(endpoint = %endpoint, error = %e, "Replica rejected replayed mutation");
                    stats.delivery_failures += 1;
                    metrics::record_delivery_outcome("failure");
                }
                Ok(Err(e)) => {
                    warn!(endpoint = %endpoint, error = %e, "Delivery task failed");
                    stats.delivery_failures += 1;
                    metrics::record_delivery_outcome("failure");
                }
                Err(_) => {
                    let e = ReplayError::DeliveryTimeout { endpoint };
                    debug!(error = %e, "Falling back to hint");
                    stats.delivery_timeouts += 1;
                    metrics::record_delivery_outcome("timeout");
                }
            }
        }

        if undelivered.is_empty() {
            return Ok(());
        }

        let mut remaining: Vec<Endpoint> = undelivered.iter().map(|e| *e.key()).collect();
        remaining.sort();

        let ttl = self.ttl.effective_ttl(&mutation, written_at);
        if ttl <= 0 {
            debug!(
                undelivered = remaining.len(),
                ttl, "Hint TTL expired during delivery, dropping undelivered replicas"
            );
            stats.hints_dropped += remaining.len();
            metrics::record_hints_dropped(remaining.len());
            return Ok(());
        }

        for endpoint in &remaining {
            trace!(endpoint = %endpoint, ttl, "Replica did not acknowledge, writing hint");
            self.hints.write_hint(&mutation, ttl, *endpoint).await?;
        }
        stats.hints_written += remaining.len();
        metrics::record_hints_written("undelivered", remaining.len());

        Ok(())
    }
}
