use std::collections::HashMap;
use std::net::IpAddr;
use std::net::SocketAddr;

use async_trait::async_trait;
use mdns_sd::ServiceDaemon;
use mdns_sd::ServiceEvent;
use mdns_sd::ServiceInfo;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::Candidate;
use super::CandidateStream;
use super::ServiceAdvertisement;
use super::ServiceDiscovery;
use crate::constants::TXT_PRIORITY;
use crate::DiscoveryError;
use crate::Result;

/// [`ServiceDiscovery`] over multicast DNS.
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
    hostname: String,
}

impl MdnsDiscovery {
    /// Starts the mDNS responder thread. `hostname` is published as
    /// `<hostname>.local.`.
    pub fn new(hostname: &str) -> Result<Self> {
        let daemon = ServiceDaemon::new().map_err(DiscoveryError::from)?;
        Ok(Self {
            daemon,
            hostname: format!("{}.local.", hostname.trim_end_matches('.').trim_end_matches(".local")),
        })
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.daemon.shutdown() {
            debug!(error = %e, "mDNS daemon already stopped");
        }
    }
}

#[async_trait]
impl ServiceDiscovery for MdnsDiscovery {
    async fn advertise(
        &self,
        advertisement: ServiceAdvertisement,
    ) -> Result<()> {
        let properties: HashMap<String, String> = advertisement.txt.clone().into_iter().collect();
        let service = ServiceInfo::new(
            &advertisement.service_type,
            &advertisement.instance,
            &self.hostname,
            "",
            advertisement.port,
            properties,
        )
        .map_err(|e| DiscoveryError::Advertise {
            service: advertisement.service_type.clone(),
            reason: e.to_string(),
        })?
        .enable_addr_auto();

        self.daemon.register(service).map_err(DiscoveryError::from)?;
        info!(
            service = %advertisement.service_type,
            instance = %advertisement.instance,
            port = advertisement.port,
            "Service advertised"
        );
        Ok(())
    }

    async fn browse(
        &self,
        service_type: &str,
    ) -> Result<CandidateStream> {
        let events = self.daemon.browse(service_type).map_err(DiscoveryError::from)?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok(event) = events.recv_async().await {
                let ServiceEvent::ServiceResolved(info) = event else {
                    trace!(?event, "Browse event ignored");
                    continue;
                };
                match candidate_from(&info) {
                    Some(candidate) => {
                        if tx.send(candidate).is_err() {
                            break;
                        }
                    }
                    None => debug!(name = %info.get_fullname(), "Resolved service lacks candidate signature"),
                }
            }
            debug!("Browse stream closed");
        });

        Ok(rx)
    }

    async fn stop_browse(
        &self,
        service_type: &str,
    ) -> Result<()> {
        self.daemon.stop_browse(service_type).map_err(DiscoveryError::from)?;
        Ok(())
    }
}

/// A resolved service is a candidate when it has an address and an integer
/// priority record.
pub(crate) fn candidate_from(info: &ServiceInfo) -> Option<Candidate> {
    let priority = info.get_property_val_str(TXT_PRIORITY)?.trim().parse::<i64>().ok()?;
    let address = preferred_address(info.get_addresses())?;
    Some(Candidate {
        name: info.get_fullname().to_string(),
        url: format!("http://{}", SocketAddr::new(address, info.get_port())),
        priority,
    })
}

/// IPv4 first, then routable IPv6, then link-local and loopback. Ties are
/// broken by address so the choice does not depend on set order.
fn preferred_address<'a>(addresses: impl IntoIterator<Item = &'a IpAddr>) -> Option<IpAddr> {
    addresses.into_iter().copied().min_by_key(|address| (address_rank(address), *address))
}

fn address_rank(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(v4) if v4.is_loopback() => 3,
        IpAddr::V4(v4) if v4.is_link_local() => 1,
        IpAddr::V4(_) => 0,
        IpAddr::V6(v6) if v6.is_loopback() => 3,
        IpAddr::V6(v6) if v6.segments()[0] & 0xffc0 == 0xfe80 => 2,
        IpAddr::V6(_) => 1,
    }
}
