//! Resource data model.
//!
//! Six concrete resource types form a fixed graph:
//!
//! ```text
//! Node <- Device <- Source <- Flow <- Sender
//!           ^  ^------------------------'
//!           '--------- Receiver
//! ```
//!
//! Each type is a plain immutable value. "Setters" are `with_*` functions
//! that consume the value and return a new one. [`Resource`] is the tagged
//! union used wherever the type is only known at runtime, and
//! [`ResourceKind`] selects the collection, path and topic for a type.

mod resources;
mod version;

pub use resources::*;
pub use version::*;

#[cfg(test)]
mod version_test;

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::StoreError;

lazy_static! {
    static ref UUID_V4: Regex =
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .expect("uuid pattern compiles");
}

/// Fresh UUID v4 in lower-case hyphenated form
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn is_uuid_v4(id: &str) -> bool {
    UUID_V4.is_match(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Node,
    Device,
    Source,
    Flow,
    Sender,
    Receiver,
}

impl ResourceKind {
    /// Registration order: every kind only references kinds before it.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Node,
        ResourceKind::Device,
        ResourceKind::Source,
        ResourceKind::Flow,
        ResourceKind::Sender,
        ResourceKind::Receiver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Node => "node",
            ResourceKind::Device => "device",
            ResourceKind::Source => "source",
            ResourceKind::Flow => "flow",
            ResourceKind::Sender => "sender",
            ResourceKind::Receiver => "receiver",
        }
    }

    /// Collection name, e.g. `devices`
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::Node => "nodes",
            ResourceKind::Device => "devices",
            ResourceKind::Source => "sources",
            ResourceKind::Flow => "flows",
            ResourceKind::Sender => "senders",
            ResourceKind::Receiver => "receivers",
        }
    }

    /// Subscription resource path, e.g. `/devices`
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Node => "/nodes",
            ResourceKind::Device => "/devices",
            ResourceKind::Source => "/sources",
            ResourceKind::Flow => "/flows",
            ResourceKind::Sender => "/senders",
            ResourceKind::Receiver => "/receivers",
        }
    }

    /// Change event topic, e.g. `/devices/`
    pub fn topic(&self) -> &'static str {
        match self {
            ResourceKind::Node => "/nodes/",
            ResourceKind::Device => "/devices/",
            ResourceKind::Source => "/sources/",
            ResourceKind::Flow => "/flows/",
            ResourceKind::Sender => "/senders/",
            ResourceKind::Receiver => "/receivers/",
        }
    }

    /// Accepts a collection path with or without the trailing slash.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        Self::ALL.into_iter().find(|k| k.path() == trimmed)
    }

    pub fn from_plural(plural: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.plural() == plural)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StoreError::Validation(format!("unknown resource type {s:?}")).into())
    }
}

pub trait Identified {
    fn id(&self) -> &str;
}

pub trait Versioned: Sized {
    fn version(&self) -> Version;

    fn with_version(
        self,
        version: Version,
    ) -> Self;

    /// Same resource stamped with a version strictly newer than its current one.
    fn bumped(self) -> Self {
        let next = Version::now().max(self.version().succ());
        self.with_version(next)
    }
}

pub trait Labeled: Sized {
    fn label(&self) -> &str;

    fn with_label(
        self,
        label: impl Into<String>,
    ) -> Self;
}

/// A foreign reference held by a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<'a> {
    pub field: &'static str,
    pub target: ResourceKind,
    pub id: &'a str,
}

/// Any of the six resource types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    Node(Node),
    Device(Device),
    Source(Source),
    Flow(Flow),
    Sender(Sender),
    Receiver(Receiver),
}

macro_rules! each_resource {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Resource::Node($inner) => $body,
            Resource::Device($inner) => $body,
            Resource::Source($inner) => $body,
            Resource::Flow($inner) => $body,
            Resource::Sender($inner) => $body,
            Resource::Receiver($inner) => $body,
        }
    };
}

impl Resource {
    /// Decodes a resource of a known type from its JSON form.
    ///
    /// Omitted id, version and label are generated. Shape errors surface as
    /// validation errors rather than parse errors.
    pub fn from_value(
        kind: ResourceKind,
        value: Value,
    ) -> Result<Self> {
        fn decode<T: serde::de::DeserializeOwned>(
            kind: ResourceKind,
            value: Value,
        ) -> Result<T> {
            serde_json::from_value(value).map_err(|e| StoreError::Validation(format!("invalid {kind}: {e}")).into())
        }

        Ok(match kind {
            ResourceKind::Node => Resource::Node(decode(kind, value)?),
            ResourceKind::Device => Resource::Device(decode(kind, value)?),
            ResourceKind::Source => Resource::Source(decode(kind, value)?),
            ResourceKind::Flow => Resource::Flow(decode(kind, value)?),
            ResourceKind::Sender => Resource::Sender(decode(kind, value)?),
            ResourceKind::Receiver => Resource::Receiver(decode(kind, value)?),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Node(_) => ResourceKind::Node,
            Resource::Device(_) => ResourceKind::Device,
            Resource::Source(_) => ResourceKind::Source,
            Resource::Flow(_) => ResourceKind::Flow,
            Resource::Sender(_) => ResourceKind::Sender,
            Resource::Receiver(_) => ResourceKind::Receiver,
        }
    }

    pub fn to_value(&self) -> Value {
        // Resource structs only hold strings, numbers and maps.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Foreign references that must resolve when this resource is written.
    pub fn references(&self) -> Vec<Reference<'_>> {
        match self {
            Resource::Node(_) => vec![],
            Resource::Device(d) => vec![Reference {
                field: "node_id",
                target: ResourceKind::Node,
                id: &d.node_id,
            }],
            Resource::Source(s) => vec![Reference {
                field: "device_id",
                target: ResourceKind::Device,
                id: &s.device_id,
            }],
            Resource::Flow(f) => vec![Reference {
                field: "source_id",
                target: ResourceKind::Source,
                id: &f.source_id,
            }],
            Resource::Sender(s) => vec![
                Reference {
                    field: "flow_id",
                    target: ResourceKind::Flow,
                    id: &s.flow_id,
                },
                Reference {
                    field: "device_id",
                    target: ResourceKind::Device,
                    id: &s.device_id,
                },
            ],
            Resource::Receiver(r) => vec![Reference {
                field: "device_id",
                target: ResourceKind::Device,
                id: &r.device_id,
            }],
        }
    }

    /// Checks identifier shape. Version shape is enforced by [`Version`].
    pub fn validate(&self) -> Result<()> {
        if !is_uuid_v4(self.id()) {
            return Err(StoreError::Validation(format!("{} id {:?} is not a UUID v4", self.kind(), self.id())).into());
        }
        for reference in self.references() {
            if !is_uuid_v4(reference.id) {
                return Err(StoreError::Validation(format!(
                    "{} {} is not a UUID v4: {:?}",
                    self.kind(),
                    reference.field,
                    reference.id
                ))
                .into());
            }
        }
        Ok(())
    }

    pub fn as_device(&self) -> Option<&Device> {
        match self {
            Resource::Device(d) => Some(d),
            _ => None,
        }
    }
}

impl Identified for Resource {
    fn id(&self) -> &str {
        each_resource!(self, r => r.id())
    }
}

impl Versioned for Resource {
    fn version(&self) -> Version {
        each_resource!(self, r => r.version())
    }

    fn with_version(
        self,
        version: Version,
    ) -> Self {
        each_resource!(self, r => r.with_version(version).into())
    }
}

impl Labeled for Resource {
    fn label(&self) -> &str {
        each_resource!(self, r => r.label())
    }

    fn with_label(
        self,
        label: impl Into<String>,
    ) -> Self {
        each_resource!(self, r => r.with_label(label).into())
    }
}
