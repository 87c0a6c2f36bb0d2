use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// A service instance to announce over DNS-SD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAdvertisement {
    /// Fully qualified type, e.g. `_nmos-node._tcp.local.`
    pub service_type: String,
    pub instance: String,
    pub port: u16,
    pub txt: BTreeMap<String, String>,
}

impl ServiceAdvertisement {
    pub fn new(
        service_type: impl Into<String>,
        instance: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            service_type: service_type.into(),
            instance: instance.into(),
            port,
            txt: BTreeMap::new(),
        }
    }

    pub fn with_txt(
        mut self,
        key: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        self.txt.insert(key.into(), value.to_string());
        self
    }
}

/// A registry found while browsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Fully qualified instance name
    pub name: String,
    /// Base URL, e.g. `http://192.168.1.10:3001`
    pub url: String,
    pub priority: i64,
}

pub type CandidateStream = mpsc::UnboundedReceiver<Candidate>;

/// Multicast service discovery.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServiceDiscovery: Send + Sync + 'static {
    /// Announces `advertisement` until the discovery backend shuts down.
    async fn advertise(
        &self,
        advertisement: ServiceAdvertisement,
    ) -> Result<()>;

    /// Starts browsing for `service_type`. Only instances carrying the
    /// candidate signature are yielded.
    async fn browse(
        &self,
        service_type: &str,
    ) -> Result<CandidateStream>;

    async fn stop_browse(
        &self,
        service_type: &str,
    ) -> Result<()>;
}

/// Highest priority wins. On a tie the earliest candidate is kept.
pub fn select_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().fold(None, |best, c| match best {
        Some(b) if b.priority >= c.priority => Some(b),
        _ => Some(c),
    })
}
