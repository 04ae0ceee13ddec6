// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! A five-node test cluster wired around one `BatchlogManager`.
//!
//! The local node is `10.0.0.1`; peers are `10.0.0.2` to `10.0.0.5`. Time is
//! driven by a [`ManualClock`] starting at [`NOW`]. The test config uses a
//! 100ms write timeout, so entries older than 200ms are stale.

use super::mock_cluster::{MockBatchlogStore, MockHintStore, MockLocalStorage, MockMessaging};
use batchlog_replay::cluster::{Endpoint, StaticFailureDetector, StaticTopology};
use batchlog_replay::mutation::{Cell, ColumnFamilyUpdate, Mutation};
use batchlog_replay::store::{BatchlogEntry, BatchlogStore};
use batchlog_replay::ttl::GcGraceHintTtl;
use batchlog_replay::{BatchlogConfig, BatchlogManager, ManualClock, ReplayServices};
use std::sync::Arc;
use uuid::Uuid;

/// Wall-clock start of every test, in milliseconds.
pub const NOW: i64 = 1_700_000_000_000;

/// Age that is well past the replay timeout (5x).
pub const STALE_AGE_MS: i64 = 1_000;

/// Gc grace of the `short_gc` table.
pub const SHORT_GC_GRACE: i64 = 60;

pub fn ep(last: u8) -> Endpoint {
    format!("10.0.0.{}", last).parse().unwrap()
}

pub fn local() -> Endpoint {
    ep(1)
}

/// A one-cell mutation on `cf`.
pub fn mutation(key: &str, cf: &str) -> Mutation {
    Mutation::new("app", key.as_bytes().to_vec()).with_update(ColumnFamilyUpdate::new(
        cf,
        vec![Cell::live("col", "value", NOW * 1000)],
    ))
}

pub struct TestCluster {
    pub store: Arc<MockBatchlogStore>,
    pub storage: Arc<MockLocalStorage>,
    pub messaging: Arc<MockMessaging>,
    pub hints: Arc<MockHintStore>,
    pub failure_detector: Arc<StaticFailureDetector>,
    pub gc_grace: Arc<GcGraceHintTtl>,
    pub clock: Arc<ManualClock>,
    pub config: BatchlogConfig,
}

impl TestCluster {
    pub fn new() -> Self {
        let gc_grace = Arc::new(GcGraceHintTtl::default());
        gc_grace.set_gc_grace("app", "short_gc", SHORT_GC_GRACE);

        Self {
            store: Arc::new(MockBatchlogStore::new()),
            storage: Arc::new(MockLocalStorage::new()),
            messaging: Arc::new(MockMessaging::new()),
            hints: Arc::new(MockHintStore::new()),
            failure_detector: Arc::new(StaticFailureDetector::new()),
            gc_grace,
            clock: Arc::new(ManualClock::new(NOW)),
            config: BatchlogConfig::for_testing(local()),
        }
    }

    /// Build a manager where every key is owned by `replicas`.
    pub fn manager(&self, replicas: Vec<Endpoint>) -> BatchlogManager {
        self.manager_with_topology(StaticTopology::new(replicas))
    }

    pub fn manager_with_topology(&self, topology: StaticTopology) -> BatchlogManager {
        let services = ReplayServices::new(
            self.store.clone(),
            self.storage.clone(),
            Arc::new(topology),
            self.failure_detector.clone(),
            self.messaging.clone(),
            self.hints.clone(),
        )
        .with_hint_ttl_source(self.gc_grace.clone())
        .with_clock(self.clock.clone());

        BatchlogManager::new(self.config.clone(), services)
    }

    /// Log `mutations` as a batch written `age_ms` ago.
    pub async fn log_batch(&self, mutations: &[Mutation], age_ms: i64) -> Uuid {
        let id = Uuid::new_v4();
        let entry = BatchlogEntry::from_mutations(id, NOW - age_ms, mutations).unwrap();
        self.store.insert(entry).await.unwrap();
        id
    }

    /// Log a raw payload written `age_ms` ago.
    pub async fn log_raw(&self, payload: Vec<u8>, age_ms: i64) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert(BatchlogEntry::new(id, NOW - age_ms, payload))
            .await
            .unwrap();
        id
    }
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}
