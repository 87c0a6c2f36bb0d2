use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use nmos_ledger::Device;
use nmos_ledger::DeviceType;
use nmos_ledger::Flow;
use nmos_ledger::Format;
use nmos_ledger::Labeled;
use nmos_ledger::Ledger;
use nmos_ledger::LedgerBuilder;
use nmos_ledger::LedgerConfig;
use nmos_ledger::Node;
use nmos_ledger::Role;
use nmos_ledger::Sender;
use nmos_ledger::Source;
use nmos_ledger::Transport;
use tokio::sync::watch;

pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub struct TestContext {
    pub graceful_tx: watch::Sender<()>,
    pub ledger: Ledger,
}

impl TestContext {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.ledger.address())
    }

    pub async fn shutdown(self) {
        self.graceful_tx.send(()).expect("ledger still listening");
        self.ledger.wait().await.expect("clean shutdown");
    }
}

/// Registry on an ephemeral local port without mDNS.
pub async fn start_registry(customize: impl FnOnce(&mut LedgerConfig)) -> TestContext {
    let mut config = LedgerConfig::default();
    config.role = Role::Registry;
    config.discovery.enable_mdns = false;
    config.registry.listen_address = SocketAddr::from(([127, 0, 0, 1], 0));
    customize(&mut config);

    let (graceful_tx, graceful_rx) = watch::channel(());
    let ledger = LedgerBuilder::from_config(config, graceful_rx)
        .start()
        .await
        .expect("registry starts");
    TestContext { graceful_tx, ledger }
}

/// Node -> device -> source -> flow -> sender, all freshly generated.
pub struct Chain {
    pub node: Node,
    pub device: Device,
    pub source: Source,
    pub flow: Flow,
    pub sender: Sender,
}

pub fn chain(label: &str) -> Chain {
    let node = Node::new("http://127.0.0.1:3000/", "node-host").with_label(label);
    let device = Device::new(&node.id, DeviceType::Generic).with_label(format!("{label}-device"));
    let source = Source::new(&device.id, Format::Video).with_label(format!("{label}-source"));
    let flow = Flow::new(&source.id, Format::Video).with_label(format!("{label}-flow"));
    let sender = Sender::new(&device.id, &flow.id, Transport::RtpMulticast).with_label(format!("{label}-sender"));
    Chain {
        node,
        device,
        source,
        flow,
        sender,
    }
}

/// Polls `check` until it holds or [`WAIT_LIMIT`] passes.
pub async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
