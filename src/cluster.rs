// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cluster collaborator traits.
//!
//! Defines what the replay engine needs from the rest of the node: replica
//! placement, liveness, mutation delivery, and hint storage. The daemon wires
//! real implementations in; tests use recording mocks.
//!
//! # Example
//!
//! ```rust,no_run
//! use batchlog_replay::cluster::{BoxFuture, Endpoint, HintStore};
//! use batchlog_replay::mutation::Mutation;
//!
//! struct LoggingHints;
//!
//! impl HintStore for LoggingHints {
//!     fn write_hint(&self, mutation: &Mutation, ttl_seconds: i64, endpoint: Endpoint) -> BoxFuture<'_, ()> {
//!         let keyspace = mutation.keyspace().to_string();
//!         Box::pin(async move {
//!             println!("hint for {} in {} (ttl {}s)", endpoint, keyspace, ttl_seconds);
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use crate::error::Result;
use crate::mutation::Mutation;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::net::{AddrParseError, IpAddr};
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

/// Type alias for boxed async futures (keeps the traits object-safe).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Address of a node in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(IpAddr);

impl Endpoint {
    pub fn new(addr: IpAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> IpAddr {
        self.0
    }
}

impl From<IpAddr> for Endpoint {
    fn from(addr: IpAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for Endpoint {
    type Err = AddrParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replica placement.
pub trait Topology: Send + Sync + 'static {
    /// Endpoints owning `key` under the current ring.
    fn natural_endpoints(&self, keyspace: &str, key: &[u8]) -> Vec<Endpoint>;

    /// Endpoints gaining ownership of `key` through an in-progress
    /// membership change.
    fn pending_endpoints(&self, key: &[u8], keyspace: &str) -> Vec<Endpoint>;

    /// Natural followed by pending endpoints, without duplicates.
    fn write_endpoints(&self, keyspace: &str, key: &[u8]) -> Vec<Endpoint> {
        let mut targets = self.natural_endpoints(keyspace, key);
        for endpoint in self.pending_endpoints(key, keyspace) {
            if !targets.contains(&endpoint) {
                targets.push(endpoint);
            }
        }
        targets
    }
}

/// Liveness oracle (gossip failure detector).
pub trait FailureDetector: Send + Sync + 'static {
    fn is_alive(&self, endpoint: &Endpoint) -> bool;
}

/// Request/response mutation delivery.
pub trait MessagingService: Send + Sync + 'static {
    /// Send `mutation` to `endpoint`.
    ///
    /// The returned future resolves `Ok(())` once the replica acknowledges
    /// the write and `Err` if it answers with a failure. It must not borrow
    /// `self`: the replay engine drives it on its own task and may abandon it
    /// when the write timeout expires.
    fn send_mutation(&self, mutation: Arc<Mutation>, endpoint: Endpoint) -> BoxFuture<'static, ()>;
}

/// Hinted-handoff storage.
pub trait HintStore: Send + Sync + 'static {
    /// Durably store a hint of `mutation` for `endpoint`, valid for
    /// `ttl_seconds` (always > 0).
    fn write_hint(&self, mutation: &Mutation, ttl_seconds: i64, endpoint: Endpoint) -> BoxFuture<'_, ()>;
}

/// A topology that places every key on the same replicas.
///
/// Useful for single-range deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    natural: Vec<Endpoint>,
    pending: Vec<Endpoint>,
}

impl StaticTopology {
    pub fn new(natural: Vec<Endpoint>) -> Self {
        Self {
            natural,
            pending: Vec::new(),
        }
    }

    pub fn with_pending(mut self, pending: Vec<Endpoint>) -> Self {
        self.pending = pending;
        self
    }
}

impl Topology for StaticTopology {
    fn natural_endpoints(&self, _keyspace: &str, _key: &[u8]) -> Vec<Endpoint> {
        self.natural.clone()
    }

    fn pending_endpoints(&self, _key: &[u8], _keyspace: &str) -> Vec<Endpoint> {
        self.pending.clone()
    }
}

/// A failure detector driven by explicit up/down marks.
///
/// Every endpoint is alive until marked down.
#[derive(Debug, Default)]
pub struct StaticFailureDetector {
    down: DashSet<Endpoint>,
}

impl StaticFailureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_down(&self, endpoint: Endpoint) {
        self.down.insert(endpoint);
    }

    pub fn mark_up(&self, endpoint: &Endpoint) {
        self.down.remove(endpoint);
    }
}

impl FailureDetector for StaticFailureDetector {
    fn is_alive(&self, endpoint: &Endpoint) -> bool {
        !self.down.contains(endpoint)
    }
}
