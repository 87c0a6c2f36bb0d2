use crate::Device;
use crate::DeviceType;
use crate::Flow;
use crate::Format;
use crate::Labeled;
use crate::Node;
use crate::Resource;
use crate::Sender;
use crate::Source;
use crate::Store;
use crate::Transport;

/// A node with one device, source and flow, all stored.
#[derive(Debug, Clone)]
pub(crate) struct Chain {
    pub node: Node,
    pub device: Device,
    pub source: Source,
    pub flow: Flow,
}

impl Chain {
    pub fn new() -> Self {
        let node = Node::new("http://172.29.80.65:12345/", "host1").with_label("node");
        let device = Device::new(&node.id, DeviceType::Generic).with_label("device");
        let source = Source::new(&device.id, Format::Video).with_label("source");
        let flow = Flow::new(&source.id, Format::Video).with_label("flow");
        Self {
            node,
            device,
            source,
            flow,
        }
    }

    pub fn sender(&self) -> Sender {
        Sender::new(&self.device.id, &self.flow.id, Transport::RtpMulticast).with_label("sender")
    }

    /// The chain in registration order
    pub fn resources(&self) -> Vec<Resource> {
        vec![
            self.node.clone().into(),
            self.device.clone().into(),
            self.source.clone().into(),
            self.flow.clone().into(),
        ]
    }
}

/// Puts `resource`, panicking on rejection.
pub(crate) fn put(
    store: &Store,
    resource: impl Into<Resource>,
) -> Store {
    store.put(resource.into()).expect("put should succeed").0
}

/// Registry store holding a fresh [`Chain`]
pub(crate) fn registry_chain() -> (Store, Chain) {
    let chain = Chain::new();
    let store = chain.resources().into_iter().fold(Store::registry(), |s, r| put(&s, r));
    (store, chain)
}

/// Node store holding a fresh [`Chain`] below its own node
pub(crate) fn node_chain() -> (Store, Chain) {
    let chain = Chain::new();
    let store = chain.resources().into_iter().skip(1).fold(Store::for_node(chain.node.clone()), |s, r| put(&s, r));
    (store, chain)
}
