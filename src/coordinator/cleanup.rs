// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Post-cycle batchlog cleanup.
//!
//! Replayed entries are deleted with tombstones, so the space they occupy is
//! only reclaimed once the batchlog is flushed and its segments compacted.
//! Runs once per completed scan, whether or not anything was replayed.

use crate::error::Result;
use crate::metrics;
use crate::store::LocalStorage;
use std::time::Instant;
use tracing::{debug, instrument};

/// What a cleanup pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub segments_compacted: usize,
}

/// Flush the batchlog, then compact its segments if there are any.
///
/// Both steps block until the storage engine reports completion; errors
/// propagate to the caller as a cycle failure.
#[instrument(skip_all)]
pub async fn cleanup(storage: &dyn LocalStorage) -> Result<CleanupStats> {
    let start = Instant::now();

    storage.force_blocking_flush_batchlog().await?;

    let segments = storage.batchlog_segments().await?;
    if segments.is_empty() {
        debug!("No batchlog segments after flush, skipping compaction");
        metrics::record_cleanup(0, start.elapsed());
        return Ok(CleanupStats::default());
    }

    let segments_compacted = segments.len();
    storage.compact_batchlog(segments).await?;

    let duration = start.elapsed();
    metrics::record_cleanup(segments_compacted, duration);
    debug!(
        segments_compacted,
        duration_ms = duration.as_millis(),
        "Batchlog compaction complete"
    );

    Ok(CleanupStats { segments_compacted })
}
