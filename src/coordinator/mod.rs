// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batchlog manager.
//!
//! The orchestrator that ties together:
//! - The persistent batchlog via [`crate::store::BatchlogStore`]
//! - Replica placement and liveness via [`crate::cluster`]
//! - Direct delivery and hint fallback per mutation
//! - Post-cycle flush and compaction via [`crate::store::LocalStorage`]
//!
//! # Lifecycle
//!
//! 1. `new()` wires the collaborators; nothing runs yet
//! 2. `start()` registers the management handle and spawns the scheduler
//! 3. Cycles fire after the ring delay, every replay interval, and on demand
//! 4. `shutdown()` stops the scheduler, waiting at most `shutdown_timeout`

mod cleanup;
mod replay;
mod scheduler;
mod types;

pub use cleanup::CleanupStats;
pub use types::{CycleOutcome, EngineState, ReplayStats};

use crate::admin::{AdminRegistry, BatchlogAdmin, ADMIN_NAME};
use crate::clock::Clock;
use crate::cluster::{BoxFuture, FailureDetector, HintStore, MessagingService, Topology};
use crate::config::BatchlogConfig;
use crate::error::{ReplayError, Result};
use crate::metrics;
use crate::store::{BatchlogStore, LocalStorage};
use crate::ttl::HintTtlSource;
use replay::ReplayCore;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The collaborators a [`BatchlogManager`] drives.
///
/// The hint TTL source defaults to [`GcGraceHintTtl`](crate::ttl::GcGraceHintTtl)
/// built from [`HintTtlConfig`](crate::config::HintTtlConfig); the clock
/// defaults to [`SystemClock`](crate::clock::SystemClock).
pub struct ReplayServices {
    pub store: Arc<dyn BatchlogStore>,
    pub storage: Arc<dyn LocalStorage>,
    pub topology: Arc<dyn Topology>,
    pub failure_detector: Arc<dyn FailureDetector>,
    pub messaging: Arc<dyn MessagingService>,
    pub hints: Arc<dyn HintStore>,
    pub hint_ttl: Option<Arc<dyn HintTtlSource>>,
    pub clock: Option<Arc<dyn Clock>>,
}

impl ReplayServices {
    pub fn new(
        store: Arc<dyn BatchlogStore>,
        storage: Arc<dyn LocalStorage>,
        topology: Arc<dyn Topology>,
        failure_detector: Arc<dyn FailureDetector>,
        messaging: Arc<dyn MessagingService>,
        hints: Arc<dyn HintStore>,
    ) -> Self {
        Self {
            store,
            storage,
            topology,
            failure_detector,
            messaging,
            hints,
            hint_ttl: None,
            clock: None,
        }
    }

    /// Use a custom hint TTL source (e.g. backed by the live schema).
    pub fn with_hint_ttl_source(mut self, source: Arc<dyn HintTtlSource>) -> Self {
        self.hint_ttl = Some(source);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// Management handle registered under [`ADMIN_NAME`].
struct AdminHandle {
    core: Arc<ReplayCore>,
    runtime: Handle,
    shutdown_rx: watch::Receiver<bool>,
}

impl BatchlogAdmin for AdminHandle {
    fn count_all_batches(&self) -> BoxFuture<'_, u64> {
        Box::pin(self.core.pending_count())
    }

    fn total_batches_replayed(&self) -> u64 {
        self.core.total_replayed()
    }

    fn force_batchlog_replay(&self) {
        if *self.shutdown_rx.borrow() {
            debug!("Ignoring forced replay, batchlog manager is shutting down");
            return;
        }
        let core = Arc::clone(&self.core);
        self.runtime.spawn(async move {
            let _ = scheduler::run_and_record(&core, "forced").await;
        });
    }
}

/// The batchlog replay engine.
///
/// Replays batches the coordinator logged but could not prove delivered,
/// so that every multi-partition write eventually reaches all replicas.
pub struct BatchlogManager {
    config: BatchlogConfig,

    /// Replay state shared with the scheduler and admin handle
    core: Arc<ReplayCore>,

    /// Management registry to register with on start
    admin_registry: Option<Arc<AdminRegistry>>,

    /// Whether our handle is currently registered
    admin_registered: bool,

    /// Engine state (broadcast to watchers)
    state_tx: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use)
    state_rx: watch::Receiver<EngineState>,

    /// Shutdown signal sender
    shutdown_tx: watch::Sender<bool>,

    /// Shutdown signal receiver
    shutdown_rx: watch::Receiver<bool>,

    /// Scheduler task handles
    task_handles: RwLock<Vec<JoinHandle<()>>>,
}

impl BatchlogManager {
    /// Create a new batchlog manager.
    ///
    /// The manager starts in `Created` state. Call [`start()`](Self::start)
    /// to begin periodic replay; [`run_cycle()`](Self::run_cycle) works in
    /// any state.
    pub fn new(config: BatchlogConfig, services: ReplayServices) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let core = Arc::new(ReplayCore::new(&config, services));

        Self {
            config,
            core,
            admin_registry: None,
            admin_registered: false,
            state_tx,
            state_rx,
            shutdown_tx,
            shutdown_rx,
            task_handles: RwLock::new(Vec::new()),
        }
    }

    /// Register with `registry` when started.
    pub fn with_admin_registry(mut self, registry: Arc<AdminRegistry>) -> Self {
        self.admin_registry = Some(registry);
        self
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Check if engine is running.
    pub fn is_running(&self) -> bool {
        matches!(self.state(), EngineState::Running)
    }

    /// Whether a replay cycle is executing right now.
    pub fn is_replaying(&self) -> bool {
        self.core.is_replaying()
    }

    /// Batches replayed (and deleted) since this manager was created.
    pub fn total_replayed(&self) -> u64 {
        self.core.total_replayed()
    }

    /// Live count of entries in the batchlog.
    pub async fn pending_count(&self) -> Result<u64> {
        self.core.pending_count().await
    }

    pub fn config(&self) -> &BatchlogConfig {
        &self.config
    }

    /// Start the batchlog manager.
    ///
    /// 1. Validates configuration
    /// 2. Registers the management handle (if a registry is attached)
    /// 3. Spawns the replay scheduler
    ///
    /// A registration conflict leaves the engine `Failed`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state() != EngineState::Created {
            return Err(ReplayError::InvalidState {
                expected: "Created".to_string(),
                actual: format!("{:?}", self.state()),
            });
        }

        info!(
            local_endpoint = %self.config.local_endpoint,
            replay_interval = %self.config.settings.replay_interval,
            ring_delay = %self.config.settings.ring_delay,
            "Starting batchlog manager"
        );

        if let Err(e) = self.config.validate() {
            error!(error = %e, "Invalid batchlog configuration");
            self.fail();
            return Err(e);
        }

        if let Some(registry) = &self.admin_registry {
            let handle = Arc::new(AdminHandle {
                core: Arc::clone(&self.core),
                runtime: Handle::current(),
                shutdown_rx: self.shutdown_rx.clone(),
            });
            if let Err(e) = registry.register(ADMIN_NAME, handle) {
                error!(error = %e, name = ADMIN_NAME, "Failed to register batchlog manager");
                self.fail();
                return Err(e);
            }
            self.admin_registered = true;
            debug!(name = ADMIN_NAME, "Registered management handle");
        }

        self.spawn_scheduler_task().await;

        let _ = self.state_tx.send(EngineState::Running);
        metrics::set_engine_state("Running");
        info!("Batchlog manager running");

        Ok(())
    }

    fn fail(&self) {
        let _ = self.state_tx.send(EngineState::Failed);
        metrics::set_engine_state("Failed");
    }

    /// Spawn the periodic replay task.
    async fn spawn_scheduler_task(&self) {
        let core = Arc::clone(&self.core);
        let shutdown_rx = self.shutdown_rx.clone();
        let initial_delay = self.config.settings.ring_delay();
        let interval = self.config.settings.replay_interval();

        let handle = tokio::spawn(async move {
            scheduler::run_scheduler(core, initial_delay, interval, shutdown_rx).await;
        });

        info!("Spawned batchlog replay scheduler");
        self.task_handles.write().await.push(handle);
    }

    /// Trigger an immediate replay cycle on a new task.
    ///
    /// Does not affect the periodic schedule. If a cycle is already running
    /// the forced one is dropped. Returns `None` once shutdown has begun.
    pub fn force_replay(&self) -> Option<JoinHandle<()>> {
        if *self.shutdown_rx.borrow() {
            debug!("Ignoring forced replay, batchlog manager is shutting down");
            return None;
        }
        let core = Arc::clone(&self.core);
        Some(tokio::spawn(async move {
            let _ = scheduler::run_and_record(&core, "forced").await;
        }))
    }

    /// Run one replay cycle on the calling task.
    ///
    /// Returns [`CycleOutcome::Skipped`] if another cycle is running.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        scheduler::run_and_record(&self.core, "manual").await
    }

    /// Shutdown the batchlog manager.
    ///
    /// Shutdown sequence:
    /// 1. Signal the scheduler to stop
    /// 2. Wait for it to finish its current cycle (bounded by `shutdown_timeout`)
    /// 3. Abort it if the wait times out
    /// 4. Unregister the management handle
    pub async fn shutdown(&mut self) {
        info!("Shutting down batchlog manager");
        let _ = self.state_tx.send(EngineState::ShuttingDown);
        metrics::set_engine_state("ShuttingDown");

        let _ = self.shutdown_tx.send(true);

        let handles: Vec<_> = {
            let mut guard = self.task_handles.write().await;
            std::mem::take(&mut *guard)
        };

        let drain_timeout = self.config.settings.shutdown_timeout();
        for (i, mut handle) in handles.into_iter().enumerate() {
            match tokio::time::timeout(drain_timeout, &mut handle).await {
                Ok(Ok(())) => {
                    debug!(task = i + 1, "Task completed gracefully");
                }
                Ok(Err(e)) => {
                    warn!(task = i + 1, error = %e, "Task panicked during shutdown");
                }
                Err(_) => {
                    warn!(task = i + 1, "Task timed out during shutdown, aborting");
                    handle.abort();
                }
            }
        }

        if self.admin_registered {
            if let Some(registry) = &self.admin_registry {
                registry.unregister(ADMIN_NAME);
            }
            self.admin_registered = false;
        }

        let _ = self.state_tx.send(EngineState::Stopped);
        metrics::set_engine_state("Stopped");
        info!("Batchlog manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Endpoint, StaticFailureDetector, StaticTopology};
    use crate::mutation::Mutation;
    use crate::store::{MemoryBatchlogStore, SegmentDescriptor};

    struct NullStorage;

    impl LocalStorage for NullStorage {
        fn apply(&self, _mutation: &Mutation) -> BoxFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn force_blocking_flush_batchlog(&self) -> BoxFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn batchlog_segments(&self) -> BoxFuture<'_, Vec<SegmentDescriptor>> {
            Box::pin(async { Ok(vec![]) })
        }

        fn compact_batchlog(&self, _segments: Vec<SegmentDescriptor>) -> BoxFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    struct NullNetwork;

    impl MessagingService for NullNetwork {
        fn send_mutation(&self, _mutation: Arc<Mutation>, _endpoint: Endpoint) -> BoxFuture<'static, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    impl HintStore for NullNetwork {
        fn write_hint(&self, _mutation: &Mutation, _ttl_seconds: i64, _endpoint: Endpoint) -> BoxFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    fn test_manager() -> BatchlogManager {
        let local: Endpoint = "10.0.0.1".parse().unwrap();
        let services = ReplayServices::new(
            Arc::new(MemoryBatchlogStore::new()),
            Arc::new(NullStorage),
            Arc::new(StaticTopology::new(vec![local])),
            Arc::new(StaticFailureDetector::new()),
            Arc::new(NullNetwork),
            Arc::new(NullNetwork),
        );
        BatchlogManager::new(BatchlogConfig::for_testing(local), services)
    }

    #[test]
    fn test_manager_initial_state() {
        let manager = test_manager();

        assert_eq!(manager.state(), EngineState::Created);
        assert!(!manager.is_running());
        assert!(!manager.is_replaying());
        assert_eq!(manager.total_replayed(), 0);
    }

    #[test]
    fn test_manager_state_receiver() {
        let manager = test_manager();

        let state_rx = manager.state_receiver();
        assert_eq!(*state_rx.borrow(), EngineState::Created);
    }

    #[tokio::test]
    async fn test_manager_start_and_shutdown() {
        let mut manager = test_manager();

        manager.start().await.unwrap();
        assert!(manager.is_running());

        manager.shutdown().await;
        assert_eq!(manager.state(), EngineState::Stopped);
        assert!(manager.force_replay().is_none());
    }

    #[tokio::test]
    async fn test_manager_start_invalid_state() {
        let mut manager = test_manager();

        let _ = manager.state_tx.send(EngineState::Running);

        let result = manager.start().await;
        if let Err(ReplayError::InvalidState { expected, actual }) = result {
            assert_eq!(expected, "Created");
            assert_eq!(actual, "Running");
        } else {
            panic!("Expected InvalidState error");
        }
    }

    #[tokio::test]
    async fn test_manager_start_rejects_invalid_config() {
        let mut manager = test_manager();
        manager.config.settings.write_rpc_timeout = "0s".to_string();

        let result = manager.start().await;
        assert!(matches!(result, Err(ReplayError::Config(_))));
        assert_eq!(manager.state(), EngineState::Failed);
    }

    #[tokio::test]
    async fn test_manager_registers_and_unregisters_admin() {
        let registry = Arc::new(AdminRegistry::new());
        let mut manager = test_manager().with_admin_registry(Arc::clone(&registry));

        manager.start().await.unwrap();
        let admin = registry.get(ADMIN_NAME).unwrap();
        assert_eq!(admin.count_all_batches().await.unwrap(), 0);
        assert_eq!(admin.total_batches_replayed(), 0);

        manager.shutdown().await;
        assert!(!registry.is_registered(ADMIN_NAME));
    }

    #[tokio::test]
    async fn test_manager_shutdown_from_created() {
        let mut manager = test_manager();

        manager.shutdown().await;

        assert_eq!(manager.state(), EngineState::Stopped);
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn test_run_cycle_without_start() {
        let manager = test_manager();

        let outcome = manager.run_cycle().await.unwrap();
        assert!(!outcome.is_skipped());
        assert_eq!(manager.pending_count().await.unwrap(), 0);
    }
}
