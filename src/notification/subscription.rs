use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use crate::generate_id;
use crate::ResourceKind;
use crate::Result;
use crate::SubscriptionError;

/// Field name to required value
pub type Params = Map<String, Value>;

/// A validated subscription request
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSpec {
    pub kind: ResourceKind,
    pub params: Params,
    pub persist: bool,
    pub max_update_rate_ms: u64,
}

impl SubscriptionSpec {
    /// Checks every required field of a JSON request body.
    pub fn from_value(request: &Value) -> Result<Self> {
        let body = request.as_object().ok_or(SubscriptionError::InvalidField {
            field: "body",
            reason: "expected a JSON object".into(),
        })?;
        let field = |name: &'static str| body.get(name).ok_or(SubscriptionError::MissingField(name));

        let max_update_rate_ms = field("max_update_rate_ms")?.as_u64().ok_or(SubscriptionError::InvalidField {
            field: "max_update_rate_ms",
            reason: "expected a non-negative integer".into(),
        })?;

        let persist = field("persist")?.as_bool().ok_or(SubscriptionError::InvalidField {
            field: "persist",
            reason: "expected a boolean".into(),
        })?;

        let path = field("resource_path")?.as_str().ok_or(SubscriptionError::InvalidField {
            field: "resource_path",
            reason: "expected a string".into(),
        })?;
        let kind = ResourceKind::from_path(path).ok_or_else(|| SubscriptionError::InvalidField {
            field: "resource_path",
            reason: format!("{path:?} is not a resource collection"),
        })?;

        let params = field("params")?
            .as_object()
            .cloned()
            .ok_or(SubscriptionError::InvalidField {
                field: "params",
                reason: "expected an object".into(),
            })?;

        Ok(Self {
            kind,
            params,
            persist,
            max_update_rate_ms,
        })
    }
}

/// A stored subscription as served by the query API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub id: String,
    pub ws_href: String,
    pub resource_path: String,
    pub params: Params,
    pub persist: bool,
    pub max_update_rate_ms: u64,
    #[serde(skip)]
    kind: ResourceKind,
}

impl Subscription {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn same_spec(
        &self,
        spec: &SubscriptionSpec,
    ) -> bool {
        self.kind == spec.kind
            && self.params == spec.params
            && self.persist == spec.persist
            && self.max_update_rate_ms == spec.max_update_rate_ms
    }
}

/// Subscriptions by id
#[derive(Debug)]
pub struct SubscriptionRegistry {
    ws_base: String,
    subscriptions: DashMap<String, Subscription>,
    /// Serializes lookup-then-insert in `create`
    creating: Mutex<()>,
}

impl SubscriptionRegistry {
    /// `ws_base` is the public websocket base, e.g. `ws://registry:3001`.
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
            subscriptions: DashMap::new(),
            creating: Mutex::new(()),
        }
    }

    /// Creates a subscription, or returns the existing one with an identical
    /// spec. The flag is true when a new one was made.
    pub fn create(
        &self,
        spec: SubscriptionSpec,
    ) -> (Subscription, bool) {
        let _creating = self.creating.lock();
        if let Some(existing) = self.subscriptions.iter().find(|s| s.same_spec(&spec)) {
            debug!(id = %existing.id, "Subscription already exists");
            return (existing.clone(), false);
        }

        let id = generate_id();
        let subscription = Subscription {
            ws_href: format!("{}/ws/?uid={}", self.ws_base, id),
            id: id.clone(),
            resource_path: spec.kind.path().to_string(),
            params: spec.params,
            persist: spec.persist,
            max_update_rate_ms: spec.max_update_rate_ms,
            kind: spec.kind,
        };
        self.subscriptions.insert(id.clone(), subscription.clone());
        info!(%id, path = %subscription.resource_path, persist = subscription.persist, "Subscription created");
        (subscription, true)
    }

    pub fn list(&self) -> Vec<Subscription> {
        let mut all: Vec<Subscription> = self.subscriptions.iter().map(|s| s.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Result<Subscription> {
        self.subscriptions
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| SubscriptionError::NotFound(id.to_string()).into())
    }

    /// Explicit delete, allowed for persistent subscriptions only.
    pub fn delete(
        &self,
        id: &str,
    ) -> Result<Subscription> {
        let subscription = self.get(id)?;
        if !subscription.persist {
            return Err(SubscriptionError::NotPersistent(id.to_string()).into());
        }
        self.remove(id);
        Ok(subscription)
    }

    /// Removes regardless of persistence.
    pub(crate) fn remove(
        &self,
        id: &str,
    ) -> Option<Subscription> {
        let removed = self.subscriptions.remove(id).map(|(_, s)| s);
        if removed.is_some() {
            info!(%id, "Subscription removed");
        }
        removed
    }

    /// Subscriptions listening to `kind`
    pub(crate) fn for_kind(
        &self,
        kind: ResourceKind,
    ) -> Vec<Subscription> {
        self.subscriptions.iter().filter(|s| s.kind() == kind).map(|s| s.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
