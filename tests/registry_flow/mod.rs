use std::time::Duration;

use nmos_ledger::Error;
use nmos_ledger::HttpRegistryClient;
use nmos_ledger::Labeled;
use nmos_ledger::RegistrationError;
use nmos_ledger::RegistryClient;
use nmos_ledger::Resource;
use nmos_ledger::ResourceKind;
use nmos_ledger::Versioned;
use serde_json::Value;

use crate::common::chain;
use crate::common::start_registry;
use crate::common::wait_until;

async fn query(
    base: &str,
    path: &str,
) -> (u16, Value) {
    let res = reqwest::get(format!("{base}/x-nmos/query/v1.0/{path}")).await.unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn node_registers_its_whole_chain() {
    let ctx = start_registry(|_| {}).await;
    let base = ctx.base_url();
    let client = HttpRegistryClient::new();
    let chain = chain("studio");

    let resources: Vec<Resource> = vec![
        chain.node.clone().into(),
        chain.device.clone().into(),
        chain.source.clone().into(),
        chain.flow.clone().into(),
        chain.sender.clone().into(),
    ];
    for resource in &resources {
        client.register(&base, resource).await.unwrap();
    }

    let (status, device) = query(&base, &format!("devices/{}", chain.device.id)).await;
    assert_eq!(status, 200);
    assert_eq!(device["senders"], serde_json::json!([chain.sender.id]));

    client.heartbeat(&base, &chain.node.id).await.unwrap();

    // Re-registering an unchanged node after a reset is accepted
    client.register(&base, &chain.node.clone().into()).await.unwrap();

    client.deregister(&base, ResourceKind::Sender, &chain.sender.id).await.unwrap();
    client.deregister(&base, ResourceKind::Sender, &chain.sender.id).await.unwrap();
    let (status, _) = query(&base, &format!("senders/{}", chain.sender.id)).await;
    assert_eq!(status, 404);

    ctx.shutdown().await;
}

#[tokio::test]
async fn stale_and_dangling_registrations_are_rejected() {
    let ctx = start_registry(|_| {}).await;
    let base = ctx.base_url();
    let client = HttpRegistryClient::new();
    let chain = chain("stale");

    let err = client.register(&base, &chain.device.clone().into()).await.unwrap_err();
    assert!(matches!(err, Error::Registration(RegistrationError::Rejected { status: 400, .. })));

    let renamed = chain.node.clone().with_label("renamed").bumped();
    client.register(&base, &chain.node.clone().into()).await.unwrap();
    client.register(&base, &renamed.into()).await.unwrap();
    let err = client.register(&base, &chain.node.clone().into()).await.unwrap_err();
    assert!(matches!(err, Error::Registration(RegistrationError::Rejected { status: 409, .. })));

    let (_, node) = query(&base, &format!("nodes/{}", chain.node.id)).await;
    assert_eq!(node["label"], "renamed");

    ctx.shutdown().await;
}

#[tokio::test]
async fn heartbeat_for_unknown_node_is_reported() {
    let ctx = start_registry(|_| {}).await;
    let client = HttpRegistryClient::new();
    let chain = chain("ghost");

    let err = client.heartbeat(&ctx.base_url(), &chain.node.id).await.unwrap_err();

    assert!(matches!(err, Error::Registration(RegistrationError::UnknownNode(_))));
    ctx.shutdown().await;
}

#[tokio::test]
async fn silent_nodes_expire_with_their_resources() {
    let ctx = start_registry(|config| {
        config.registry.health_expiry_ms = 300;
        config.registry.reap_interval_ms = 50;
    })
    .await;
    let base = ctx.base_url();
    let client = HttpRegistryClient::new();
    let quiet = chain("quiet");
    let chatty = chain("chatty");

    for chain in [&quiet, &chatty] {
        client.register(&base, &chain.node.clone().into()).await.unwrap();
        client.register(&base, &chain.device.clone().into()).await.unwrap();
    }

    let keep_alive = {
        let base = base.clone();
        let node_id = chatty.node.id.clone();
        tokio::spawn(async move {
            let client = HttpRegistryClient::new();
            loop {
                let _ = client.heartbeat(&base, &node_id).await;
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
    };

    let store = ctx.ledger.store().clone();
    let quiet_node = quiet.node.id.clone();
    assert!(wait_until(|| {
        let store = store.clone();
        let id = quiet_node.clone();
        async move { store.get(&id, Some(ResourceKind::Node)).is_err() }
    })
    .await);

    let (_, devices) = query(&base, "devices/").await;
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["id"], chatty.device.id.as_str());

    keep_alive.abort();
    ctx.shutdown().await;
}
