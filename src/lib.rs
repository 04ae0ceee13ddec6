// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Batchlog Replay
//!
//! The batchlog replay engine of a replicated data store node.
//!
//! ## Architecture
//!
//! A coordinator applying a multi-partition write first logs the whole batch
//! to the batchlog, then delivers it. Batches that were never confirmed and
//! removed are picked up here and pushed to every replica:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                            BatchlogManager                                │
//! │                                                                           │
//! │  ┌───────────┐    ┌───────────────┐    ┌───────────────────────────────┐  │
//! │  │ Scheduler │───►│ BatchlogStore │───►│ decode + TTL check            │  │
//! │  │ (periodic │    │ (stale scan)  │    │ (codec, ttl)                  │  │
//! │  │  + forced)│    └───────────────┘    └───────────────────────────────┘  │
//! │  └───────────┘                                         │                  │
//! │                                                        ▼                  │
//! │  ┌───────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │ LocalStorage  │◄───│ route per replica: local / alive / dead      │    │
//! │  │ (apply, flush,│    │ (Topology, FailureDetector)                  │    │
//! │  │  compact)     │    └──────────────────────────────────────────────┘    │
//! │  └───────────────┘           │                        │                   │
//! │                              ▼                        ▼                   │
//! │                   ┌────────────────────┐    ┌──────────────────┐          │
//! │                   │ MessagingService   │───►│ HintStore        │          │
//! │                   │ (bounded fan-out)  │    │ (undelivered)    │          │
//! │                   └────────────────────┘    └──────────────────┘          │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Safety Rule
//!
//! A mutation is only replayed or hinted while its hint TTL, decayed by the
//! batch's age, is positive. Past that point tombstones it races against may
//! already have been purged, and replaying it would resurrect deleted data.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batchlog_replay::cluster::{StaticFailureDetector, StaticTopology};
//! use batchlog_replay::store::MemoryBatchlogStore;
//! use batchlog_replay::{BatchlogConfig, BatchlogManager, ReplayServices};
//! # use batchlog_replay::cluster::{BoxFuture, Endpoint, HintStore, MessagingService};
//! # use batchlog_replay::mutation::Mutation;
//! # use batchlog_replay::store::{LocalStorage, SegmentDescriptor};
//! # use std::sync::Arc;
//! # struct Node;
//! # impl LocalStorage for Node {
//! #     fn apply(&self, _: &Mutation) -> BoxFuture<'_, ()> { Box::pin(async { Ok(()) }) }
//! #     fn force_blocking_flush_batchlog(&self) -> BoxFuture<'_, ()> { Box::pin(async { Ok(()) }) }
//! #     fn batchlog_segments(&self) -> BoxFuture<'_, Vec<SegmentDescriptor>> { Box::pin(async { Ok(vec![]) }) }
//! #     fn compact_batchlog(&self, _: Vec<SegmentDescriptor>) -> BoxFuture<'_, ()> { Box::pin(async { Ok(()) }) }
//! # }
//! # impl MessagingService for Node {
//! #     fn send_mutation(&self, _: Arc<Mutation>, _: Endpoint) -> BoxFuture<'static, ()> { Box::pin(async { Ok(()) }) }
//! # }
//! # impl HintStore for Node {
//! #     fn write_hint(&self, _: &Mutation, _: i64, _: Endpoint) -> BoxFuture<'_, ()> { Box::pin(async { Ok(()) }) }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BatchlogConfig::default();
//!     let node = Arc::new(Node);
//!     let services = ReplayServices::new(
//!         Arc::new(MemoryBatchlogStore::new()),
//!         node.clone(),
//!         Arc::new(StaticTopology::new(vec![config.local_endpoint])),
//!         Arc::new(StaticFailureDetector::new()),
//!         node.clone(),
//!         node,
//!     );
//!
//!     let mut manager = BatchlogManager::new(config, services);
//!     manager.start().await.expect("Failed to start");
//!
//!     // Manager replays until shutdown
//!     manager.shutdown().await;
//! }
//! ```

pub mod admin;
pub mod clock;
pub mod cluster;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod mutation;
pub mod store;
pub mod ttl;

// Re-exports for convenience
pub use admin::{AdminRegistry, BatchlogAdmin, ADMIN_NAME};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cluster::{BoxFuture, Endpoint, FailureDetector, HintStore, MessagingService, Topology};
pub use config::{BatchlogConfig, HintTtlConfig, ReplaySettings};
pub use coordinator::{BatchlogManager, CleanupStats, CycleOutcome, EngineState, ReplayServices, ReplayStats};
pub use error::{ReplayError, Result};
pub use mutation::{Cell, ColumnFamilyUpdate, Mutation};
pub use store::{BatchlogEntry, BatchlogEntrySummary, BatchlogStore, LocalStorage, MemoryBatchlogStore};
pub use ttl::{GcGraceHintTtl, HintTtlCalculator, HintTtlSource};
