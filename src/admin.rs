// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Operator management surface.
//!
//! The daemon exposes registered handles to its management interface. The
//! replay engine registers itself under [`ADMIN_NAME`] on `start()`; a name
//! collision is a [`ReplayError::Registration`] and aborts startup.

use crate::cluster::BoxFuture;
use crate::error::{ReplayError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Object name the batchlog manager registers under.
pub const ADMIN_NAME: &str = "batchlog:type=BatchlogManager";

/// Operations an operator can invoke on the batchlog.
pub trait BatchlogAdmin: Send + Sync + 'static {
    /// Entries currently in the batchlog.
    fn count_all_batches(&self) -> BoxFuture<'_, u64>;

    /// Batches replayed since startup.
    fn total_batches_replayed(&self) -> u64;

    /// Trigger an immediate replay cycle.
    fn force_batchlog_replay(&self);
}

/// Registry of management handles, keyed by object name.
#[derive(Default)]
pub struct AdminRegistry {
    handles: DashMap<String, Arc<dyn BatchlogAdmin>>,
}

impl AdminRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `name`. Fails if the name is taken.
    pub fn register(&self, name: &str, handle: Arc<dyn BatchlogAdmin>) -> Result<()> {
        match self.handles.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ReplayError::Registration(format!(
                "{} is already registered",
                name
            ))),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove a registration; returns whether one existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.handles.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BatchlogAdmin>> {
        self.handles.get(name).map(|h| Arc::clone(h.value()))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handles.contains_key(name)
    }
}
