use std::time::Duration;

use crate::Error;
use crate::RegistrationError;
use crate::ResourceKind;
use crate::StoreError;
use crate::SubscriptionError;

#[test]
fn store_rejections_map_to_client_errors() {
    let validation: Error = StoreError::Validation("bad id".into()).into();
    assert_eq!(validation.status_code(), 400);

    let conflict: Error = StoreError::Conflict {
        kind: ResourceKind::Flow,
        id: "f".into(),
        stored: "2:0".into(),
        attempted: "1:0".into(),
    }
    .into();
    assert_eq!(conflict.status_code(), 409);

    let reference: Error = StoreError::Reference {
        kind: ResourceKind::Flow,
        id: "f".into(),
        field: "source_id",
        target: ResourceKind::Source,
        target_id: "s".into(),
    }
    .into();
    assert_eq!(reference.status_code(), 400);
    assert_eq!(reference.to_string(), "flow f references missing source via source_id = s");

    let missing: Error = StoreError::NotFound {
        kind: ResourceKind::Node,
        id: "n".into(),
    }
    .into();
    assert_eq!(missing.status_code(), 404);
    assert_eq!(Error::from(StoreError::UnknownId("x".into())).status_code(), 404);
}

#[test]
fn subscription_errors() {
    assert_eq!(Error::from(SubscriptionError::MissingField("persist")).status_code(), 400);
    assert_eq!(Error::from(SubscriptionError::NotFound("s".into())).status_code(), 404);
    assert_eq!(Error::from(SubscriptionError::NotPersistent("s".into())).status_code(), 403);
}

#[test]
fn internal_failures_are_server_errors() {
    assert_eq!(Error::from(StoreError::Unavailable("gone".into())).status_code(), 500);
    assert_eq!(
        Error::from(RegistrationError::HeartbeatTimeout(Duration::from_secs(4))).status_code(),
        500
    );
    assert_eq!(Error::Fatal("boom".into()).status_code(), 500);
    assert_eq!(Error::from(RegistrationError::UnknownNode("n".into())).status_code(), 404);
}
