// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine state and cycle result types.
//!
//! # State Transitions
//!
//! ```text
//!                  start()
//! Created ───────────────────→ Running
//!    │                            │
//!    │ (registration or           │ shutdown()
//!    │  config failure)           ↓
//!    ↓                       ShuttingDown
//! Failed                          │
//!                                 ↓
//!                              Stopped
//! ```
//!
//! Independently of the engine state, each replay cycle moves the replaying
//! flag `Idle → Running → Idle`. A cycle requested while another is running
//! returns [`CycleOutcome::Skipped`].

/// State of the batchlog manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created but not started. No cycles are scheduled.
    Created,

    /// Scheduler running; cycles fire periodically and on demand.
    Running,

    /// `shutdown()` called, waiting for the scheduler task to stop.
    ShuttingDown,

    /// Stopped. Safe to drop.
    Stopped,

    /// Startup failed (invalid config or management registration error).
    Failed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::Running => write!(f, "Running"),
            EngineState::ShuttingDown => write!(f, "ShuttingDown"),
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Statistics from one replay cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Entries returned by the scan.
    pub entries_scanned: usize,
    /// Entries left alone because they are not older than the replay timeout.
    pub entries_too_young: usize,
    /// Entries deleted between scan and fetch.
    pub entries_missing: usize,
    /// Entries deleted after replay, undecodable ones included.
    pub batches_replayed: usize,
    /// Entries whose payload was undecodable (deleted without replay).
    pub decode_failures: usize,
    /// Mutations routed to replicas.
    pub mutations_replayed: usize,
    /// Mutations skipped because their hint TTL had expired.
    pub mutations_expired: usize,
    /// Mutations applied to local storage.
    pub local_applies: usize,
    /// Mutation RPCs dispatched.
    pub rpcs_sent: usize,
    /// RPCs not acknowledged before the write timeout.
    pub delivery_timeouts: usize,
    /// RPCs answered with a failure.
    pub delivery_failures: usize,
    /// Hints written (dead replicas and undelivered replicas).
    pub hints_written: usize,
    /// Undelivered replicas dropped because the TTL expired during delivery.
    pub hints_dropped: usize,
    /// Batchlog segments submitted for compaction by the post-cycle cleanup.
    pub segments_compacted: usize,
}

/// Result of a `run_cycle()` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already running; nothing was done.
    Skipped,
    /// A full scan, replay, and cleanup pass ran.
    Completed(ReplayStats),
}

impl CycleOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped)
    }

    pub fn stats(&self) -> Option<&ReplayStats> {
        match self {
            CycleOutcome::Completed(stats) => Some(stats),
            CycleOutcome::Skipped => None,
        }
    }
}
