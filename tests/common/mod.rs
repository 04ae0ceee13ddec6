// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared test utilities for integration and chaos tests.
//!
//! This module provides:
//! - Recording mocks for the batchlog, local storage, messaging, and hints
//! - A test cluster fixture wiring them into a `BatchlogManager`

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_cluster;

pub use fixtures::*;
pub use mock_cluster::*;
