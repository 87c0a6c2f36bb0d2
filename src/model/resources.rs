use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use super::generate_id;
use super::Identified;
use super::Labeled;
use super::Resource;
use super::ResourceKind;
use super::Version;
use super::Versioned;

/// Free-form JSON object used for `caps` and `tags`
pub type Attributes = Map<String, Value>;

/// Compile-time association between a concrete type and its kind.
pub trait ResourceType: Identified + Versioned + Labeled + Clone + Into<Resource> {
    const KIND: ResourceKind;
}

macro_rules! impl_resource {
    ($ty:ident, $kind:expr) => {
        impl Identified for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        }

        impl Versioned for $ty {
            fn version(&self) -> Version {
                self.version
            }

            fn with_version(
                self,
                version: Version,
            ) -> Self {
                Self { version, ..self }
            }
        }

        impl Labeled for $ty {
            fn label(&self) -> &str {
                &self.label
            }

            fn with_label(
                self,
                label: impl Into<String>,
            ) -> Self {
                Self {
                    label: label.into(),
                    ..self
                }
            }
        }

        impl ResourceType for $ty {
            const KIND: ResourceKind = $kind;
        }

        impl From<$ty> for Resource {
            fn from(value: $ty) -> Self {
                Resource::$ty(value)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "urn:x-nmos:device:generic")]
    Generic,
    #[serde(rename = "urn:x-nmos:device:pipeline")]
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "urn:x-nmos:format:video")]
    Video,
    #[serde(rename = "urn:x-nmos:format:audio")]
    Audio,
    #[serde(rename = "urn:x-nmos:format:event")]
    Event,
    #[serde(rename = "urn:x-nmos:format:mux")]
    Mux,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    #[serde(rename = "urn:x-nmos:transport:rtp")]
    Rtp,
    #[serde(rename = "urn:x-nmos:transport:rtp.ucast")]
    RtpUnicast,
    #[serde(rename = "urn:x-nmos:transport:rtp.mcast")]
    RtpMulticast,
    #[serde(rename = "urn:x-nmos:transport:dash")]
    Dash,
}

/// An API endpoint advertised by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeService {
    pub href: String,
    #[serde(rename = "type")]
    pub service_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default = "Version::now")]
    pub version: Version,
    #[serde(default)]
    pub label: String,
    pub href: String,
    pub hostname: String,
    #[serde(default)]
    pub caps: Attributes,
    #[serde(default)]
    pub services: Vec<NodeService>,
}

impl Node {
    pub fn new(
        href: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            version: Version::now(),
            label: String::new(),
            href: href.into(),
            hostname: hostname.into(),
            caps: Attributes::new(),
            services: vec![],
        }
    }

    pub fn with_id(
        self,
        id: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), ..self }
    }

    pub fn with_href(
        self,
        href: impl Into<String>,
    ) -> Self {
        Self {
            href: href.into(),
            ..self
        }
    }

    pub fn with_service(
        mut self,
        service: NodeService,
    ) -> Self {
        self.services.push(service);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default = "Version::now")]
    pub version: Version,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub node_id: String,
    /// Maintained by the store from stored senders
    #[serde(default)]
    pub senders: Vec<String>,
    /// Maintained by the store from stored receivers
    #[serde(default)]
    pub receivers: Vec<String>,
}

impl Device {
    pub fn new(
        node_id: impl Into<String>,
        device_type: DeviceType,
    ) -> Self {
        Self {
            id: generate_id(),
            version: Version::now(),
            label: String::new(),
            device_type,
            node_id: node_id.into(),
            senders: vec![],
            receivers: vec![],
        }
    }

    /// Copy without the derived sender and receiver lists.
    pub fn stripped(&self) -> Self {
        Self {
            senders: vec![],
            receivers: vec![],
            ..self.clone()
        }
    }

    /// Adds `sender_id` unless already listed.
    pub(crate) fn with_sender(
        mut self,
        sender_id: &str,
    ) -> Self {
        if !self.senders.iter().any(|s| s == sender_id) {
            self.senders.push(sender_id.to_string());
        }
        self
    }

    /// Adds `receiver_id` unless already listed.
    pub(crate) fn with_receiver(
        mut self,
        receiver_id: &str,
    ) -> Self {
        if !self.receivers.iter().any(|r| r == receiver_id) {
            self.receivers.push(receiver_id.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default = "Version::now")]
    pub version: Version,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub format: Format,
    #[serde(default)]
    pub caps: Attributes,
    #[serde(default)]
    pub tags: Attributes,
    pub device_id: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl Source {
    pub fn new(
        device_id: impl Into<String>,
        format: Format,
    ) -> Self {
        Self {
            id: generate_id(),
            version: Version::now(),
            label: String::new(),
            description: String::new(),
            format,
            caps: Attributes::new(),
            tags: Attributes::new(),
            device_id: device_id.into(),
            parents: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: u64,
    #[serde(default = "one")]
    pub denominator: u64,
}

fn one() -> u64 {
    1
}

impl Rational {
    pub const ZERO: Rational = Rational {
        numerator: 0,
        denominator: 1,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default = "Version::now")]
    pub version: Version,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub format: Format,
    #[serde(default)]
    pub tags: Attributes,
    pub source_id: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grain_rate: Option<Rational>,
}

impl Flow {
    pub fn new(
        source_id: impl Into<String>,
        format: Format,
    ) -> Self {
        Self {
            id: generate_id(),
            version: Version::now(),
            label: String::new(),
            description: String::new(),
            format,
            tags: Attributes::new(),
            source_id: source_id.into(),
            parents: vec![],
            grain_rate: None,
        }
    }

    pub fn with_id(
        self,
        id: impl Into<String>,
    ) -> Self {
        Self { id: id.into(), ..self }
    }

    pub fn with_grain_rate(
        self,
        numerator: u64,
        denominator: u64,
    ) -> Self {
        Self {
            grain_rate: Some(Rational { numerator, denominator }),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default = "Version::now")]
    pub version: Version,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub flow_id: String,
    pub transport: Transport,
    pub device_id: String,
    #[serde(default)]
    pub manifest_href: String,
}

impl Sender {
    pub fn new(
        device_id: impl Into<String>,
        flow_id: impl Into<String>,
        transport: Transport,
    ) -> Self {
        Self {
            id: generate_id(),
            version: Version::now(),
            label: String::new(),
            description: String::new(),
            flow_id: flow_id.into(),
            transport,
            device_id: device_id.into(),
            manifest_href: String::new(),
        }
    }

    pub fn with_manifest_href(
        self,
        manifest_href: impl Into<String>,
    ) -> Self {
        Self {
            manifest_href: manifest_href.into(),
            ..self
        }
    }
}

/// The sender a receiver is currently subscribed to, if any
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverSubscription {
    pub sender_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default = "Version::now")]
    pub version: Version,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub format: Format,
    #[serde(default)]
    pub caps: Attributes,
    #[serde(default)]
    pub tags: Attributes,
    pub device_id: String,
    pub transport: Transport,
    #[serde(default)]
    pub subscription: ReceiverSubscription,
}

impl Receiver {
    pub fn new(
        device_id: impl Into<String>,
        format: Format,
        transport: Transport,
    ) -> Self {
        Self {
            id: generate_id(),
            version: Version::now(),
            label: String::new(),
            description: String::new(),
            format,
            caps: Attributes::new(),
            tags: Attributes::new(),
            device_id: device_id.into(),
            transport,
            subscription: ReceiverSubscription::default(),
        }
    }

    pub fn subscribed_to(
        self,
        sender_id: Option<String>,
    ) -> Self {
        Self {
            subscription: ReceiverSubscription { sender_id },
            ..self
        }
    }
}

impl_resource!(Node, ResourceKind::Node);
impl_resource!(Device, ResourceKind::Device);
impl_resource!(Source, ResourceKind::Source);
impl_resource!(Flow, ResourceKind::Flow);
impl_resource!(Sender, ResourceKind::Sender);
impl_resource!(Receiver, ResourceKind::Receiver);
