//! Immutable store snapshot.
//!
//! [`Store`] is a value: `put` and `delete` validate against `&self` and, on
//! success, return a new `Store` alongside a description of the change. The
//! receiver is never modified, so any reader still holding it keeps a
//! consistent view. Collections are reference counted and only the ones a
//! mutation touches are copied.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use super::ListQuery;
use super::Page;
use crate::is_uuid_v4;
use crate::ChangeEvent;
use crate::ChangeRecord;
use crate::Device;
use crate::Identified;
use crate::Node;
use crate::Resource;
use crate::ResourceKind;
use crate::Result;
use crate::StoreError;
use crate::Versioned;

type Collection = Arc<BTreeMap<String, Resource>>;

/// Result of a successful `put`
#[derive(Debug, Clone, PartialEq)]
pub struct PutOutcome {
    pub resource: Resource,
    pub previous: Option<Resource>,
}

impl PutOutcome {
    pub fn created(&self) -> bool {
        self.previous.is_none()
    }

    pub fn event(&self) -> ChangeEvent {
        ChangeEvent::single(
            self.resource.kind(),
            ChangeRecord::new(self.previous.clone(), Some(self.resource.clone())),
        )
    }
}

/// Result of a successful `delete`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub kind: ResourceKind,
    pub id: String,
    pub previous: Resource,
}

impl DeleteOutcome {
    pub fn event(&self) -> ChangeEvent {
        ChangeEvent::single(self.kind, ChangeRecord::new(Some(self.previous.clone()), None))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    /// Set when the store belongs to a node rather than a registry
    local_node: Option<String>,
    collections: [Collection; 6],
}

fn slot(kind: ResourceKind) -> usize {
    match kind {
        ResourceKind::Node => 0,
        ResourceKind::Device => 1,
        ResourceKind::Source => 2,
        ResourceKind::Flow => 3,
        ResourceKind::Sender => 4,
        ResourceKind::Receiver => 5,
    }
}

impl Store {
    /// Empty store that accepts resources from any node.
    pub fn registry() -> Self {
        Self::default()
    }

    /// Store owned by a node. It holds `node` itself, and every device must
    /// belong to it.
    pub fn for_node(node: Node) -> Self {
        let mut store = Self {
            local_node: Some(node.id.clone()),
            ..Self::default()
        };
        store.collections[slot(ResourceKind::Node)] = Arc::new(BTreeMap::from([(node.id.clone(), node.into())]));
        store
    }

    pub fn local_node_id(&self) -> Option<&str> {
        self.local_node.as_deref()
    }

    /// The node a node store belongs to.
    pub fn self_node(&self) -> Option<&Node> {
        let id = self.local_node.as_deref()?;
        match self.collection(ResourceKind::Node).get(id) {
            Some(Resource::Node(node)) => Some(node),
            _ => None,
        }
    }

    fn collection(
        &self,
        kind: ResourceKind,
    ) -> &BTreeMap<String, Resource> {
        &self.collections[slot(kind)]
    }

    pub fn resources(
        &self,
        kind: ResourceKind,
    ) -> impl Iterator<Item = &Resource> {
        self.collection(kind).values()
    }

    pub fn len(
        &self,
        kind: ResourceKind,
    ) -> usize {
        self.collection(kind).len()
    }

    pub fn contains(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> bool {
        self.collection(kind).contains_key(id)
    }

    /// Looks `id` up in one collection, or in all of them when `kind` is None.
    pub fn get(
        &self,
        id: &str,
        kind: Option<ResourceKind>,
    ) -> Result<&Resource> {
        match kind {
            Some(kind) => self.collection(kind).get(id).ok_or_else(|| {
                StoreError::NotFound {
                    kind,
                    id: id.to_string(),
                }
                .into()
            }),
            None => ResourceKind::ALL
                .into_iter()
                .find_map(|kind| self.collection(kind).get(id))
                .ok_or_else(|| StoreError::UnknownId(id.to_string()).into()),
        }
    }

    /// Filtered, paginated listing. Totals are computed before slicing.
    pub fn list(
        &self,
        kind: ResourceKind,
        query: &ListQuery,
    ) -> Result<Page> {
        let matching: Vec<&Resource> = self.resources(kind).filter(|r| query.matches(r)).collect();
        Ok(Page::slice(matching, query))
    }

    /// Inserts or replaces `resource`.
    ///
    /// Validation order: identifier shape, version ordering against the stored
    /// copy, then referential integrity against this snapshot. Storing a
    /// sender or receiver also lists it on its device.
    pub fn put(
        &self,
        resource: Resource,
    ) -> Result<(Store, PutOutcome)> {
        resource.validate()?;
        let kind = resource.kind();
        let id = resource.id().to_string();

        if let (Resource::Node(node), Some(local)) = (&resource, self.local_node.as_deref()) {
            if node.id != local {
                return Err(StoreError::Validation(format!(
                    "node store for {local} can not hold another node {}",
                    node.id
                ))
                .into());
            }
        }

        let previous = self.collection(kind).get(&id).cloned();
        if let Some(existing) = &previous {
            if resource.version() <= existing.version() {
                return Err(StoreError::Conflict {
                    kind,
                    id,
                    stored: existing.version().to_string(),
                    attempted: resource.version().to_string(),
                }
                .into());
            }
        }

        self.check_references(&resource)?;

        let resource = match resource {
            Resource::Device(device) => Resource::Device(self.with_derived_lists(device, previous.as_ref())),
            other => other,
        };

        let mut next = self.clone();
        Arc::make_mut(&mut next.collections[slot(kind)]).insert(id.clone(), resource.clone());
        next.cascade(&resource, previous.as_ref());

        trace!(%kind, %id, created = previous.is_none(), "Resource stored");
        Ok((next, PutOutcome { resource, previous }))
    }

    /// Removes a resource. References to it from other resources are left as
    /// they are.
    pub fn delete(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<(Store, DeleteOutcome)> {
        if !is_uuid_v4(id) {
            return Err(StoreError::Validation(format!("{kind} id {id:?} is not a UUID v4")).into());
        }
        if kind == ResourceKind::Node && self.local_node.as_deref() == Some(id) {
            return Err(StoreError::Validation(format!("node {id} can not delete itself")).into());
        }

        let mut next = self.clone();
        let previous = Arc::make_mut(&mut next.collections[slot(kind)])
            .remove(id)
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })?;

        Ok((
            next,
            DeleteOutcome {
                kind,
                id: id.to_string(),
                previous,
            },
        ))
    }

    fn check_references(
        &self,
        resource: &Resource,
    ) -> Result<()> {
        for reference in resource.references() {
            let resolved = match (reference.target, self.local_node.as_deref()) {
                (ResourceKind::Node, Some(local)) => reference.id == local,
                (target, _) => self.contains(target, reference.id),
            };
            if !resolved {
                return Err(StoreError::Reference {
                    kind: resource.kind(),
                    id: resource.id().to_string(),
                    field: reference.field,
                    target: reference.target,
                    target_id: reference.id.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Client supplied sender and receiver lists are ignored: keep what the
    /// previous version had and add anything already stored against it.
    fn with_derived_lists(
        &self,
        device: Device,
        previous: Option<&Resource>,
    ) -> Device {
        let (senders, receivers) = match previous.and_then(Resource::as_device) {
            Some(prev) => (prev.senders.clone(), prev.receivers.clone()),
            None => (vec![], vec![]),
        };
        let mut device = Device {
            senders,
            receivers,
            ..device
        };

        for resource in self.resources(ResourceKind::Sender) {
            if let Resource::Sender(s) = resource {
                if s.device_id == device.id {
                    device = device.with_sender(&s.id);
                }
            }
        }
        for resource in self.resources(ResourceKind::Receiver) {
            if let Resource::Receiver(r) = resource {
                if r.device_id == device.id {
                    device = device.with_receiver(&r.id);
                }
            }
        }
        device
    }

    /// Keeps device sender/receiver lists in step with a stored sender or
    /// receiver. The device keeps its version.
    fn cascade(
        &mut self,
        resource: &Resource,
        previous: Option<&Resource>,
    ) {
        let (device_id, old_device_id) = match (resource, previous) {
            (Resource::Sender(s), Some(Resource::Sender(p))) => (&s.device_id, Some(&p.device_id)),
            (Resource::Receiver(r), Some(Resource::Receiver(p))) => (&r.device_id, Some(&p.device_id)),
            (Resource::Sender(s), _) => (&s.device_id, None),
            (Resource::Receiver(r), _) => (&r.device_id, None),
            _ => return,
        };
        let id = resource.id();
        let is_sender = resource.kind() == ResourceKind::Sender;

        let devices = Arc::make_mut(&mut self.collections[slot(ResourceKind::Device)]);

        // Moved to another device: the old one no longer owns it
        if let Some(old) = old_device_id.filter(|old| *old != device_id) {
            if let Some(Resource::Device(d)) = devices.get_mut(old.as_str()) {
                d.senders.retain(|s| !(is_sender && s == id));
                d.receivers.retain(|r| !(!is_sender && r == id));
            }
        }

        if let Some(Resource::Device(d)) = devices.get_mut(device_id.as_str()) {
            *d = if is_sender {
                d.clone().with_sender(id)
            } else {
                d.clone().with_receiver(id)
            };
        }
    }
}
