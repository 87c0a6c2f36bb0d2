//! Ledger error hierarchy
//!
//! Errors are grouped by the layer that raises them. Store and subscription
//! errors are synchronous and local: they are returned to the caller before
//! any state changes. Registration and discovery errors never reach store
//! clients; the registration lifecycle absorbs them and resets itself.

use std::time::Duration;

use config::ConfigError;

use crate::ResourceKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Resource store rejections
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Subscription request and lookup failures
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Registry push and heartbeat failures
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Multicast discovery failures
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Configuration file or environment could not be parsed
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Signal sender closed: {0}")]
    SignalSenderClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed id, version or field shape
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Replacement version is not strictly newer than the stored one
    #[error("Version conflict on {kind} {id}: stored {stored}, attempted {attempted}")]
    Conflict {
        kind: ResourceKind,
        id: String,
        stored: String,
        attempted: String,
    },

    /// A foreign reference names a resource that is not stored
    #[error("{kind} {id} references missing {target} via {field} = {target_id}")]
    Reference {
        kind: ResourceKind,
        id: String,
        field: &'static str,
        target: ResourceKind,
        target_id: String,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Resource {0} not found in any collection")]
    UnknownId(String),

    /// The store actor is gone
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription request is missing required field {0}")]
    MissingField(&'static str),

    #[error("Subscription field {field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Subscription {0} not found")]
    NotFound(String),

    /// Only persistent subscriptions may be deleted explicitly
    #[error("Subscription {0} is not persistent and cannot be deleted")]
    NotPersistent(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Registry answered with a status of 300 or above
    #[error("Registry rejected {operation} with status {status}")]
    Rejected { operation: &'static str, status: u16 },

    #[error("Registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Heartbeat timed out after {0:?}")]
    HeartbeatTimeout(Duration),

    /// Registry did not answer a push or delete in time
    #[error("Registry did not answer {operation} within {limit:?}")]
    RequestTimeout { operation: &'static str, limit: Duration },

    /// Registry does not know the node the heartbeat was sent for
    #[error("Registry does not know node {0}")]
    UnknownNode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Mdns(#[from] mdns_sd::Error),

    #[error("Failed to advertise {service}: {reason}")]
    Advertise { service: String, reason: String },
}

impl Error {
    /// HTTP status code the API layer answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Store(StoreError::Validation(_)) => 400,
            Error::Store(StoreError::Reference { .. }) => 400,
            Error::Store(StoreError::Conflict { .. }) => 409,
            Error::Store(StoreError::NotFound { .. }) | Error::Store(StoreError::UnknownId(_)) => 404,
            Error::Subscription(SubscriptionError::MissingField(_))
            | Error::Subscription(SubscriptionError::InvalidField { .. }) => 400,
            Error::Subscription(SubscriptionError::NotFound(_)) => 404,
            Error::Subscription(SubscriptionError::NotPersistent(_)) => 403,
            Error::Registration(RegistrationError::UnknownNode(_)) => 404,
            Error::Json(_) => 400,
            _ => 500,
        }
    }
}
