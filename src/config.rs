// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the batchlog replay engine.
//!
//! Configuration is passed to [`BatchlogManager::new()`](crate::BatchlogManager::new)
//! and can be constructed programmatically or deserialized from YAML/JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use batchlog_replay::config::BatchlogConfig;
//!
//! let config = BatchlogConfig {
//!     local_endpoint: "10.0.0.1".parse().unwrap(),
//!     ..Default::default()
//! };
//! assert_eq!(config.settings.replay_timeout().as_secs(), 4);
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! BatchlogConfig
//! ├── local_endpoint: Endpoint        # This node's address
//! ├── settings: ReplaySettings
//! │   ├── replay_interval: "60s"      # Period between scheduled cycles
//! │   ├── ring_delay: "30s"           # Initial delay (cluster stabilization)
//! │   ├── write_rpc_timeout: "2s"     # Per-delivery wait; replay timeout is 2x
//! │   └── shutdown_timeout: "10s"     # Bound on waiting for the scheduler to stop
//! └── hints: HintTtlConfig
//!     ├── default_gc_grace_sec: 864000
//!     └── max_hint_ttl_sec: 2147483647
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! local_endpoint: "10.0.0.1"
//! settings:
//!   replay_interval: "60s"
//!   ring_delay: "30s"
//!   write_rpc_timeout: "2s"
//! hints:
//!   default_gc_grace_sec: 864000
//! ```

use crate::cluster::Endpoint;
use crate::error::{ReplayError, Result};
use crate::ttl::DEFAULT_GC_GRACE_SECONDS;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config: passed from daemon to BatchlogManager::new()
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `BatchlogManager::new()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchlogConfig {
    /// Address of the node running this engine.
    /// Mutations routed here are applied locally instead of sent over RPC.
    pub local_endpoint: Endpoint,

    /// Scheduling and timeout settings.
    #[serde(default)]
    pub settings: ReplaySettings,

    /// Hint TTL settings.
    #[serde(default)]
    pub hints: HintTtlConfig,
}

impl Default for BatchlogConfig {
    fn default() -> Self {
        Self {
            local_endpoint: Endpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            settings: ReplaySettings::default(),
            hints: HintTtlConfig::default(),
        }
    }
}

impl BatchlogConfig {
    /// Create a config for testing: short timeouts, no initial delay.
    pub fn for_testing(local_endpoint: Endpoint) -> Self {
        Self {
            local_endpoint,
            settings: ReplaySettings::testing(),
            hints: HintTtlConfig::default(),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        self.hints.validate()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ReplaySettings: scheduling and timeouts
// ═══════════════════════════════════════════════════════════════════════════════

/// Scheduling and timeout settings. Durations are human strings ("60s", "2s").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// Period between scheduled replay cycles.
    #[serde(default = "default_replay_interval")]
    pub replay_interval: String,

    /// Delay before the first scheduled cycle, to let gossip settle
    /// liveness and ring state after startup.
    #[serde(default = "default_ring_delay")]
    pub ring_delay: String,

    /// Write RPC timeout. Bounds each direct-delivery wait; entries younger
    /// than twice this value are left to the normal write path.
    #[serde(default = "default_write_rpc_timeout")]
    pub write_rpc_timeout: String,

    /// How long `shutdown()` waits for the scheduler task.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,
}

fn default_replay_interval() -> String {
    "60s".to_string()
}

fn default_ring_delay() -> String {
    "30s".to_string()
}

fn default_write_rpc_timeout() -> String {
    "2s".to_string()
}

fn default_shutdown_timeout() -> String {
    "10s".to_string()
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            replay_interval: default_replay_interval(),
            ring_delay: default_ring_delay(),
            write_rpc_timeout: default_write_rpc_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ReplaySettings {
    /// Fast settings for tests.
    pub fn testing() -> Self {
        Self {
            replay_interval: "1s".to_string(),
            ring_delay: "0s".to_string(),
            write_rpc_timeout: "100ms".to_string(),
            shutdown_timeout: "1s".to_string(),
        }
    }

    /// Replay interval as a Duration (60s if unparseable).
    pub fn replay_interval(&self) -> Duration {
        parse_or(&self.replay_interval, Duration::from_secs(60))
    }

    /// Ring delay as a Duration (30s if unparseable).
    pub fn ring_delay(&self) -> Duration {
        parse_or(&self.ring_delay, Duration::from_secs(30))
    }

    /// Write RPC timeout as a Duration (2s if unparseable).
    pub fn write_rpc_timeout(&self) -> Duration {
        parse_or(&self.write_rpc_timeout, Duration::from_secs(2))
    }

    /// Shutdown timeout as a Duration (10s if unparseable).
    pub fn shutdown_timeout(&self) -> Duration {
        parse_or(&self.shutdown_timeout, Duration::from_secs(10))
    }

    /// Minimum age before an entry is replayed: twice the write RPC timeout.
    pub fn replay_timeout(&self) -> Duration {
        self.write_rpc_timeout() * 2
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("replay_interval", &self.replay_interval),
            ("ring_delay", &self.ring_delay),
            ("write_rpc_timeout", &self.write_rpc_timeout),
            ("shutdown_timeout", &self.shutdown_timeout),
        ] {
            humantime::parse_duration(value)
                .map_err(|e| ReplayError::Config(format!("{}: invalid duration {:?}: {}", name, value, e)))?;
        }
        if self.replay_interval().is_zero() {
            return Err(ReplayError::Config("replay_interval must be > 0".to_string()));
        }
        if self.write_rpc_timeout().is_zero() {
            return Err(ReplayError::Config("write_rpc_timeout must be > 0".to_string()));
        }
        Ok(())
    }
}

fn parse_or(value: &str, fallback: Duration) -> Duration {
    humantime::parse_duration(value).unwrap_or(fallback)
}

// ═══════════════════════════════════════════════════════════════════════════════
// HintTtlConfig
// ═══════════════════════════════════════════════════════════════════════════════

/// Inputs to the default hint TTL source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HintTtlConfig {
    /// Gc grace period of tables without an explicit setting.
    #[serde(default = "default_gc_grace_sec")]
    pub default_gc_grace_sec: i64,

    /// Upper bound on any hint TTL.
    #[serde(default = "default_max_hint_ttl_sec")]
    pub max_hint_ttl_sec: i64,
}

fn default_gc_grace_sec() -> i64 {
    DEFAULT_GC_GRACE_SECONDS
}

fn default_max_hint_ttl_sec() -> i64 {
    i32::MAX as i64
}

impl Default for HintTtlConfig {
    fn default() -> Self {
        Self {
            default_gc_grace_sec: default_gc_grace_sec(),
            max_hint_ttl_sec: default_max_hint_ttl_sec(),
        }
    }
}

impl HintTtlConfig {
    fn validate(&self) -> Result<()> {
        if self.default_gc_grace_sec < 0 || self.max_hint_ttl_sec < 0 {
            return Err(ReplayError::Config(
                "hint TTL settings must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
