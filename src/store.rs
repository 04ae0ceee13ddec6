// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batchlog and local storage collaborators.
//!
//! [`BatchlogStore`] is the persistent log the write path appends batches to
//! and the replay engine drains. [`LocalStorage`] is the node's own storage
//! engine, used to apply mutations owned by this node and to reclaim batchlog
//! space after a cycle.
//!
//! The store is assumed to serialize its own operations; the replay engine
//! issues at most one outstanding call per logical step.

use crate::cluster::BoxFuture;
use crate::codec;
use crate::error::Result;
use crate::mutation::Mutation;
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A logged batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchlogEntry {
    pub id: Uuid,
    /// Wall-clock milliseconds at which the coordinator logged the batch.
    pub written_at: i64,
    /// Encoded mutations (see [`crate::codec`]).
    pub payload: Vec<u8>,
}

impl BatchlogEntry {
    pub fn new(id: Uuid, written_at: i64, payload: Vec<u8>) -> Self {
        Self {
            id,
            written_at,
            payload,
        }
    }

    /// Build the entry the write path logs for `mutations`.
    pub fn from_mutations(id: Uuid, written_at: i64, mutations: &[Mutation]) -> Result<Self> {
        Ok(Self::new(id, written_at, codec::encode(mutations)?))
    }

    pub fn summary(&self) -> BatchlogEntrySummary {
        BatchlogEntrySummary {
            id: self.id,
            written_at: self.written_at,
        }
    }
}

/// The `{id, written_at}` row returned by enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchlogEntrySummary {
    pub id: Uuid,
    pub written_at: i64,
}

impl BatchlogEntrySummary {
    /// Whether the entry is older than `timeout_ms` at `now_ms`.
    ///
    /// Entries at or under the timeout may still be in flight through the
    /// normal write path and must be left alone.
    pub fn is_stale(&self, now_ms: i64, timeout_ms: i64) -> bool {
        now_ms > self.written_at.saturating_add(timeout_ms)
    }
}

/// Identifier of a persisted batchlog segment (an on-disk table file).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentDescriptor(pub String);

impl fmt::Display for SegmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persistent batchlog.
pub trait BatchlogStore: Send + Sync + 'static {
    /// Every entry currently in the log.
    fn list_all(&self) -> BoxFuture<'_, Vec<BatchlogEntrySummary>>;

    /// Fetch one entry; `None` if it was deleted in the meantime.
    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<BatchlogEntry>>;

    /// Delete an entry. Deleting a missing id is not an error.
    fn delete(&self, id: Uuid) -> BoxFuture<'_, ()>;

    /// Live count of entries.
    fn count(&self) -> BoxFuture<'_, u64>;

    /// Append an entry (write path).
    fn insert(&self, entry: BatchlogEntry) -> BoxFuture<'_, ()>;
}

/// The node's local storage engine.
pub trait LocalStorage: Send + Sync + 'static {
    /// Apply a mutation owned by this node.
    fn apply(&self, mutation: &Mutation) -> BoxFuture<'_, ()>;

    /// Flush the batchlog's in-memory state to disk, returning once durable.
    fn force_blocking_flush_batchlog(&self) -> BoxFuture<'_, ()>;

    /// Persisted batchlog segments.
    fn batchlog_segments(&self) -> BoxFuture<'_, Vec<SegmentDescriptor>>;

    /// Compact the given segments into one, returning once done.
    fn compact_batchlog(&self, segments: Vec<SegmentDescriptor>) -> BoxFuture<'_, ()>;
}

/// In-memory batchlog for standalone mode and tests.
#[derive(Debug, Default)]
pub struct MemoryBatchlogStore {
    entries: RwLock<BTreeMap<Uuid, BatchlogEntry>>,
}

impl MemoryBatchlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is currently logged.
    pub async fn contains(&self, id: Uuid) -> bool {
        self.entries.read().await.contains_key(&id)
    }
}

impl BatchlogStore for MemoryBatchlogStore {
    fn list_all(&self) -> BoxFuture<'_, Vec<BatchlogEntrySummary>> {
        Box::pin(async move {
            Ok(self
                .entries
                .read()
                .await
                .values()
                .map(BatchlogEntry::summary)
                .collect())
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<BatchlogEntry>> {
        Box::pin(async move { Ok(self.entries.read().await.get(&id).cloned()) })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.entries.write().await.remove(&id);
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, u64> {
        Box::pin(async move { Ok(self.entries.read().await.len() as u64) })
    }

    fn insert(&self, entry: BatchlogEntry) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            tracing::trace!(batch_id = %entry.id, written_at = entry.written_at, "Logging batch");
            self.entries.write().await.insert(entry.id, entry);
            Ok(())
        })
    }
}
