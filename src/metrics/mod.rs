use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref STORE_MUTATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("store_mutations", "Store mutations by resource kind, operation and outcome"),
        &["kind", "operation", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref BUS_EVENTS_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("bus_events_published", "Change events published on the bus"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref GRAINS_DELIVERED: IntCounterVec = IntCounterVec::new(
        Opts::new("grains_delivered", "Grains sent to subscription connections"),
        &["resource_path"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_CONNECTIONS: IntGauge =
        IntGauge::new("active_connections", "Open subscription delivery connections")
            .expect("metric can not be created");

    pub static ref REGISTRATION_RESETS: IntCounter =
        IntCounter::new("registration_resets", "Registration lifecycle resets")
            .expect("metric can not be created");

    pub static ref HEARTBEATS_SENT: IntCounterVec = IntCounterVec::new(
        Opts::new("heartbeats_sent", "Heartbeats sent to the registry by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref NODES_EXPIRED: IntCounter =
        IntCounter::new("nodes_expired", "Nodes removed after missing heartbeats")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("ledger".to_string()), None).expect("registry can be created");
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(STORE_MUTATIONS.clone()),
        Box::new(BUS_EVENTS_PUBLISHED.clone()),
        Box::new(GRAINS_DELIVERED.clone()),
        Box::new(ACTIVE_CONNECTIONS.clone()),
        Box::new(REGISTRATION_RESETS.clone()),
        Box::new(HEARTBEATS_SENT.clone()),
        Box::new(NODES_EXPIRED.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

/// `GET /metrics` in Prometheus text format
pub fn metrics_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
    warp::path!("metrics").and(warp::get()).and_then(metrics_handler)
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(encode(&REGISTRY))
}

pub(crate) fn encode(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    };
    String::from_utf8(buffer).unwrap_or_else(|e| {
        warn!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
