//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::phase::PipelineSettings;

/// Root configuration for the payout server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Per-phase deadlines.
    pub timeouts: TimeoutConfig,

    /// Request size limits and framing policy.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Payout table served by the in-memory store.
    pub store: StoreConfig,
}

impl ServerConfig {
    /// Pipeline settings derived from timeouts and limits.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            read_timeout: Duration::from_secs(self.timeouts.read_secs),
            write_timeout: Duration::from_secs(self.timeouts.write_secs),
            handler_timeout: Duration::from_secs(self.timeouts.handler_secs),
            max_header_bytes: self.limits.max_header_bytes,
            max_body_bytes: self.limits.max_body_bytes,
            reject_excess_body: self.limits.reject_excess_body,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle deadline for a single socket read.
    pub read_secs: u64,

    /// Deadline for writing one response.
    pub write_secs: u64,

    /// Deadline for the request handler.
    pub handler_secs: u64,

    /// How long shutdown waits for open connections.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 60,
            write_secs: 30,
            handler_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest header block in bytes, delimiter included.
    pub max_header_bytes: usize,

    /// Largest request body in bytes.
    pub max_body_bytes: usize,

    /// Answer 400 when bytes beyond the declared body are already buffered.
    /// Set to `false` to accept pipelined requests.
    pub reject_excess_body: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 8 * 1024,
            max_body_bytes: 1024 * 1024, // 1MB
            reject_excess_body: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Payout store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub payouts: Vec<PayoutEntry>,
}

/// One row of the payout table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PayoutEntry {
    pub race_id: String,
    pub horse_number: u32,
    /// Payout in the smallest currency unit.
    pub payout: u64,
}
