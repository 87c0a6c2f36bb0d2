use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::utils::net::advertised_base;
use crate::utils::net::http_base;
use crate::Result;

/// Identity and HTTP binding of this process
///
/// `hostname` is shared by both roles; it is advertised over mDNS and used to
/// derive public URLs when a listener is bound to a wildcard address.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeConfig {
    /// Default: `nmos-ledger`
    #[serde(default = "default_label")]
    pub label: String,

    /// Default: `localhost`
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Node API bind address
    ///
    /// Default: `0.0.0.0:3000`
    #[serde(default = "default_listen_addr")]
    pub listen_address: SocketAddr,

    /// Advertised base URL of the node API. Derived from hostname and port
    /// when empty.
    #[serde(default)]
    pub href: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            hostname: default_hostname(),
            listen_address: default_listen_addr(),
            href: String::new(),
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(invalid("node.hostname cannot be empty"));
        }
        if self.listen_address.port() == 0 {
            return Err(invalid("node.listen_address must specify a non-zero port"));
        }
        Ok(())
    }

    /// Base URL other parties reach this node at, with a trailing slash.
    pub fn advertised_href(&self) -> String {
        let base = if self.href.is_empty() {
            advertised_base("http", &self.hostname, self.listen_address)
        } else {
            http_base(&self.href)
        };
        format!("{base}/")
    }
}

fn default_label() -> String {
    "nmos-ledger".to_string()
}
fn default_hostname() -> String {
    "localhost".to_string()
}
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}
