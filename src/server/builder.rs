//! A builder for a running [`Ledger`] process.
//!
//! [`LedgerBuilder`] assembles the components a role needs:
//! - **registry**: registry store, notification engine, health tracker and
//!   node reaper, registration + query APIs, websocket delivery, and the
//!   registration/query service advertisements.
//! - **node**: node store seeded with its own Node (plus any resources
//!   added on the builder), node API, and the registration lifecycle that
//!   finds a registry and keeps the store pushed to it.
//!
//! Both roles serve `/metrics`. Every background task stops when the
//! shutdown signal fires.
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let ledger = LedgerBuilder::from_config(config, shutdown_rx)
//!     .resource(device)
//!     .start()
//!     .await?;
//! ledger.wait().await?;
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::Instrument;
use warp::Filter;

use super::Ledger;
use crate::api::handle_rejection;
use crate::api::node_routes;
use crate::api::query_routes;
use crate::api::registration_routes;
use crate::api::websocket_route;
use crate::constants::API_VERSION;
use crate::constants::TXT_API_PROTO;
use crate::constants::TXT_API_VERSION;
use crate::constants::TXT_PRIORITY;
use crate::metrics::metrics_route;
use crate::Error;
use crate::EventBus;
use crate::HealthTracker;
use crate::HttpRegistryClient;
use crate::Labeled;
use crate::LedgerConfig;
use crate::MdnsDiscovery;
use crate::Node;
use crate::NodeReaper;
use crate::NotificationEngine;
use crate::RegistrationLifecycle;
use crate::Resource;
use crate::Result;
use crate::Role;
use crate::ServiceAdvertisement;
use crate::ServiceDiscovery;
use crate::Store;
use crate::StoreHandle;

pub struct LedgerBuilder {
    config: LedgerConfig,
    shutdown_signal: watch::Receiver<()>,
    self_node: Option<Node>,
    resources: Vec<Resource>,
}

impl LedgerBuilder {
    /// Loads configuration from defaults, `CONFIG_PATH` and the environment,
    /// then layers `config_path` over it when given.
    pub fn new(
        config_path: Option<&str>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Result<Self> {
        let mut config = LedgerConfig::new()?;
        if let Some(path) = config_path {
            info!(%path, "Applying override config");
            config = config.with_override_config(path)?;
        }
        Ok(Self::from_config(config.validate()?, shutdown_signal))
    }

    pub fn from_config(
        config: LedgerConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            shutdown_signal,
            self_node: None,
            resources: vec![],
        }
    }

    /// Node role only: the Node resource to own. Defaults to one derived
    /// from the `node` config section.
    pub fn self_node(
        mut self,
        node: Node,
    ) -> Self {
        self.self_node = Some(node);
        self
    }

    /// Node role only: a resource to hold from the start. Resources are
    /// stored in the order they are added.
    pub fn resource(
        mut self,
        resource: impl Into<Resource>,
    ) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Spawns every task for the configured role and binds the HTTP server.
    pub async fn start(self) -> Result<Ledger> {
        match self.config.role {
            Role::Registry => self.start_registry().await,
            Role::Node => self.start_node().await,
        }
    }

    async fn start_registry(self) -> Result<Ledger> {
        let config = &self.config;
        let shutdown = self.shutdown_signal.clone();
        let store = StoreHandle::spawn(Store::registry(), EventBus::new());
        let engine = NotificationEngine::new(
            store.clone(),
            config.registry.advertised_ws_base(&config.node.hostname),
        );
        let tracker = HealthTracker::new();
        let reaper = NodeReaper::new(store.clone(), tracker.clone(), &config.registry);

        let mut tasks = vec![
            spawn("notification", engine.clone().run(shutdown.clone())),
            spawn("reaper", reaper.run(shutdown.clone())),
        ];

        let routes = registration_routes(store.clone(), tracker.clone())
            .or(query_routes(store.clone(), engine.clone()))
            .unify()
            .or(websocket_route(engine.clone()))
            .unify()
            .or(metrics_route())
            .recover(handle_rejection);
        let (address, server) = bind(routes, config.registry.listen_address, shutdown)?;
        tasks.push(spawn("http", server));
        info!(%address, "Registry listening");

        let discovery = if config.discovery.enable_mdns {
            let discovery = Arc::new(MdnsDiscovery::new(&config.node.hostname)?);
            for service in [&config.discovery.registration_service, &config.discovery.query_service] {
                let advertisement = ServiceAdvertisement::new(service.as_str(), &config.node.label, address.port())
                    .with_txt(TXT_PRIORITY, config.discovery.priority)
                    .with_txt(TXT_API_VERSION, API_VERSION)
                    .with_txt(TXT_API_PROTO, "http");
                discovery.advertise(advertisement).await?;
            }
            Some(discovery)
        } else {
            info!("mDNS disabled, registry is not advertised");
            None
        };

        Ok(Ledger {
            role: Role::Registry,
            address,
            store,
            engine: Some(engine),
            tracker: Some(tracker),
            registration: None,
            discovery,
            tasks,
        })
    }

    async fn start_node(self) -> Result<Ledger> {
        let config = &self.config;
        let shutdown = self.shutdown_signal.clone();

        let node = self.self_node.clone().unwrap_or_else(|| {
            Node::new(config.node.advertised_href(), config.node.hostname.as_str()).with_label(config.node.label.as_str())
        });
        let store = self
            .resources
            .iter()
            .cloned()
            .try_fold(Store::for_node(node), |store, resource| store.put(resource).map(|(next, _)| next))?;
        let store = StoreHandle::spawn(store, EventBus::new());

        let routes = node_routes(store.clone()).or(metrics_route()).recover(handle_rejection);
        let (address, server) = bind(routes, config.node.listen_address, shutdown.clone())?;
        let mut tasks = vec![spawn("http", server)];
        info!(%address, "Node listening");

        let (registration, discovery) = if config.discovery.enable_mdns {
            let discovery = Arc::new(MdnsDiscovery::new(&config.node.hostname)?);
            let advertisement =
                ServiceAdvertisement::new(config.discovery.node_service.as_str(), &config.node.label, address.port())
                    .with_txt(TXT_API_VERSION, API_VERSION)
                    .with_txt(TXT_API_PROTO, "http");
            let lifecycle = RegistrationLifecycle::new(
                config.discovery.clone(),
                advertisement,
                discovery.clone(),
                Arc::new(HttpRegistryClient::new()),
                store.clone(),
            );
            let view = lifecycle.watch();
            tasks.push(spawn("registration", lifecycle.run(shutdown)));
            (Some(view), Some(discovery))
        } else {
            info!("mDNS disabled, node runs without a registry");
            (None, None)
        };

        Ok(Ledger {
            role: Role::Node,
            address,
            store,
            engine: None,
            tracker: None,
            registration,
            discovery,
            tasks,
        })
    }
}

/// Binds `routes` and returns the bound address plus the serving future.
fn bind<F>(
    routes: F,
    address: SocketAddr,
    mut shutdown: watch::Receiver<()>,
) -> Result<(SocketAddr, impl Future<Output = Result<()>>)>
where
    F: Filter<Error = Infallible> + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply,
{
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(address, async move {
            let _ = shutdown.changed().await;
        })
        .map_err(|e| Error::Fatal(format!("failed to bind {address}: {e}")))?;
    Ok((bound, async move {
        server.await;
        Ok(())
    }))
}

fn spawn(
    name: &'static str,
    task: impl Future<Output = Result<()>> + Send + 'static,
) -> JoinHandle<Result<()>> {
    tokio::spawn(task.instrument(tracing::info_span!("task", name)))
}
