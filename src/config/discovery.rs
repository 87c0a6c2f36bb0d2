use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::constants::*;
use crate::Result;

/// Multicast discovery and registration lifecycle timings
///
/// The reset and watchdog delays are fixed rather than backing off. Raise
/// them when a registry is known to flap.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Service type a node advertises itself under
    #[serde(default = "default_node_service")]
    pub node_service: String,

    /// Service type browsed for registry candidates
    #[serde(default = "default_registration_service")]
    pub registration_service: String,

    #[serde(default = "default_query_service")]
    pub query_service: String,

    /// `pri` TXT value a registry advertises. Nodes pick the highest.
    ///
    /// Default: 100
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// How long browse results are collected before a candidate is picked
    ///
    /// Default: 5000
    #[serde(default = "default_settle_window_ms")]
    pub settle_window_ms: u64,

    /// Forces rediscovery when no candidate has been selected in time
    ///
    /// Default: 10000
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_ms: u64,

    /// Pause between a failure and the next browse
    ///
    /// Default: 5000
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,

    /// Default: 5000
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Default: 4000
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Upper bound for one registration push or delete. A registry that
    /// does not answer in time is treated as failed.
    ///
    /// Default: 4000
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Disable to run without multicast, e.g. in containers
    #[serde(default = "default_enable_mdns")]
    pub enable_mdns: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            node_service: default_node_service(),
            registration_service: default_registration_service(),
            query_service: default_query_service(),
            priority: default_priority(),
            settle_window_ms: default_settle_window_ms(),
            watchdog_ms: default_watchdog_ms(),
            reset_delay_ms: default_reset_delay_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            enable_mdns: default_enable_mdns(),
        }
    }
}

impl DiscoveryConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, service) in [
            ("node_service", &self.node_service),
            ("registration_service", &self.registration_service),
            ("query_service", &self.query_service),
        ] {
            if !service.ends_with(".local.") {
                return Err(invalid(format!(
                    "discovery.{name} must be a fully qualified mDNS type ending in .local., got {service:?}"
                )));
            }
        }

        for (name, value) in [
            ("settle_window_ms", self.settle_window_ms),
            ("watchdog_ms", self.watchdog_ms),
            ("reset_delay_ms", self.reset_delay_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("heartbeat_timeout_ms", self.heartbeat_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(format!("discovery.{name} must be greater than 0")));
            }
        }

        if self.heartbeat_timeout_ms >= self.heartbeat_interval_ms {
            return Err(invalid(format!(
                "discovery.heartbeat_timeout_ms ({}) must be below heartbeat_interval_ms ({})",
                self.heartbeat_timeout_ms, self.heartbeat_interval_ms
            )));
        }
        Ok(())
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_node_service() -> String {
    NODE_SERVICE.to_string()
}
fn default_registration_service() -> String {
    REGISTRATION_SERVICE.to_string()
}
fn default_query_service() -> String {
    QUERY_SERVICE.to_string()
}
fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}
fn default_settle_window_ms() -> u64 {
    DEFAULT_SETTLE_WINDOW_MS
}
fn default_watchdog_ms() -> u64 {
    DEFAULT_WATCHDOG_MS
}
fn default_reset_delay_ms() -> u64 {
    DEFAULT_RESET_DELAY_MS
}
fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}
fn default_heartbeat_timeout_ms() -> u64 {
    DEFAULT_HEARTBEAT_TIMEOUT_MS
}
fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
fn default_enable_mdns() -> bool {
    true
}
