// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the batchlog replay engine.
//!
//! Errors are categorized by the collaborator they come from and whether a
//! later replay cycle can be expected to succeed where this one failed.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Storage` | Yes | Batchlog read/write, local apply, flush, compaction, hint write |
//! | `DeliveryTimeout` | Yes | A replica did not answer within the write timeout |
//! | `Delivery` | Yes | A replica answered the mutation RPC with a failure |
//! | `Decode` | No | Batchlog payload is malformed (poison entry) |
//! | `Registration` | No | Management handle could not be registered at startup |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Engine lifecycle violation |
//! | `Shutdown` | No | Engine is shutting down |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Retry Behavior
//!
//! This crate never retries on its own beyond the single hint fallback for
//! undelivered replicas. A retryable error at cycle level simply means the
//! entry was not deleted and the next scheduled cycle will pick it up again.

use crate::cluster::Endpoint;
use thiserror::Error;

/// Result type alias for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Errors that can occur while replaying the batchlog.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// Storage collaborator failure.
    ///
    /// Covers the batchlog store (enumerate/fetch/delete/count), local
    /// mutation apply, flush and compaction, and hint writes. Surfaces as a
    /// cycle-level failure; the replaying flag is still released.
    #[error("Storage error ({operation}): {message}")]
    Storage { operation: String, message: String },

    /// A replica did not acknowledge a replayed mutation before the deadline.
    ///
    /// Non-fatal: the replica falls back to a hint.
    #[error("Delivery to {endpoint} timed out")]
    DeliveryTimeout { endpoint: Endpoint },

    /// A replica answered a replayed mutation with a failure.
    ///
    /// Non-fatal: the replica stays undelivered and falls back to a hint.
    #[error("Delivery to {endpoint} failed: {message}")]
    Delivery { endpoint: Endpoint, message: String },

    /// Batchlog payload could not be decoded.
    ///
    /// The entry is still deleted so a poison entry cannot jam the pipeline.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Management interface registration failed. Fatal at startup.
    #[error("Registration error: {0}")]
    Registration(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine lifecycle violation (e.g. `start()` on a running engine).
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Shutdown in progress.
    #[error("Shutdown in progress")]
    Shutdown,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReplayError {
    /// Create a storage error for the named operation.
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a delivery error for an endpoint.
    pub fn delivery(endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self::Delivery {
            endpoint,
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage { .. } => true,
            Self::DeliveryTimeout { .. } => true,
            Self::Delivery { .. } => true,
            Self::Decode(_) => false, // Data corruption
            Self::Registration(_) => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
            Self::Shutdown => false,
            Self::Internal(_) => false,
        }
    }

    /// Short label used for the `error_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "storage",
            Self::DeliveryTimeout { .. } => "delivery_timeout",
            Self::Delivery { .. } => "delivery",
            Self::Decode(_) => "decode",
            Self::Registration(_) => "registration",
            Self::Config(_) => "config",
            Self::InvalidState { .. } => "invalid_state",
            Self::Shutdown => "shutdown",
            Self::Internal(_) => "internal",
        }
    }
}
