use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

use crate::HealthTracker;
use crate::MdnsDiscovery;
use crate::NotificationEngine;
use crate::RegistrationView;
use crate::Result;
use crate::Role;
use crate::StoreHandle;

/// A started ledger process. Built by [`super::LedgerBuilder`].
pub struct Ledger {
    pub(super) role: Role,
    pub(super) address: SocketAddr,
    pub(super) store: StoreHandle,
    pub(super) engine: Option<NotificationEngine>,
    pub(super) tracker: Option<HealthTracker>,
    pub(super) registration: Option<watch::Receiver<RegistrationView>>,
    pub(super) discovery: Option<Arc<MdnsDiscovery>>,
    pub(super) tasks: Vec<JoinHandle<Result<()>>>,
}

impl Ledger {
    pub fn role(&self) -> Role {
        self.role
    }

    /// Address the HTTP server is bound to
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Registry role only
    pub fn engine(&self) -> Option<&NotificationEngine> {
        self.engine.as_ref()
    }

    /// Registry role only
    pub fn tracker(&self) -> Option<&HealthTracker> {
        self.tracker.as_ref()
    }

    /// Node role with mDNS enabled only
    pub fn registration(&self) -> Option<watch::Receiver<RegistrationView>> {
        self.registration.clone()
    }

    /// Waits for every task to stop after shutdown has been signalled, then
    /// withdraws mDNS advertisements.
    pub async fn wait(self) -> Result<()> {
        let mut first_error = None;
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Task failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => error!(error = %e, "Task panicked or was cancelled"),
            }
        }
        if let Some(discovery) = self.discovery {
            discovery.shutdown();
        }
        info!(role = ?self.role, "Ledger stopped");
        first_error.map_or(Ok(()), Err)
    }
}
