use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::constants::DEFAULT_HEALTH_EXPIRY_MS;
use crate::constants::DEFAULT_REAP_INTERVAL_MS;
use crate::utils::net::advertised_base;
use crate::Result;

/// Registry role settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Registration and query API bind address
    ///
    /// Default: `0.0.0.0:3001`
    #[serde(default = "default_listen_addr")]
    pub listen_address: SocketAddr,

    /// Public websocket base used in subscription `ws_href`s. Derived from
    /// the hostname and listen port when empty.
    #[serde(default)]
    pub ws_base: String,

    /// Nodes silent for longer than this are removed
    ///
    /// Default: 12000
    #[serde(default = "default_health_expiry_ms")]
    pub health_expiry_ms: u64,

    /// Default: 1000
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_addr(),
            ws_base: String::new(),
            health_expiry_ms: default_health_expiry_ms(),
            reap_interval_ms: default_reap_interval_ms(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_address.port() == 0 {
            return Err(invalid("registry.listen_address must specify a non-zero port"));
        }
        if self.reap_interval_ms == 0 {
            return Err(invalid("registry.reap_interval_ms must be greater than 0"));
        }
        if self.health_expiry_ms <= self.reap_interval_ms {
            return Err(invalid(format!(
                "registry.health_expiry_ms ({}) must exceed reap_interval_ms ({})",
                self.health_expiry_ms, self.reap_interval_ms
            )));
        }
        if !self.ws_base.is_empty() && !(self.ws_base.starts_with("ws://") || self.ws_base.starts_with("wss://")) {
            return Err(invalid(format!("registry.ws_base must be a ws:// url, got {:?}", self.ws_base)));
        }
        Ok(())
    }

    /// Websocket base without trailing slash.
    pub fn advertised_ws_base(
        &self,
        hostname: &str,
    ) -> String {
        if self.ws_base.is_empty() {
            advertised_base("ws", hostname, self.listen_address)
        } else {
            self.ws_base.trim_end_matches('/').to_string()
        }
    }

    pub fn health_expiry(&self) -> Duration {
        Duration::from_millis(self.health_expiry_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3001))
}
fn default_health_expiry_ms() -> u64 {
    DEFAULT_HEALTH_EXPIRY_MS
}
fn default_reap_interval_ms() -> u64 {
    DEFAULT_REAP_INTERVAL_MS
}
