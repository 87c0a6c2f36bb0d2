use std::time::Duration;

use nmos_ledger::Grain;
use nmos_ledger::HttpRegistryClient;
use nmos_ledger::Labeled;
use nmos_ledger::RegistryClient;
use nmos_ledger::Versioned;
use serde_json::json;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use crate::common::chain;
use crate::common::start_registry;

async fn next(grains: &mut UnboundedReceiver<Grain>) -> Grain {
    timeout(Duration::from_secs(2), grains.recv())
        .await
        .expect("grain in time")
        .expect("connection open")
}

async fn create_subscription(
    base: &str,
    body: Value,
) -> (u16, Value) {
    let res = reqwest::Client::new()
        .post(format!("{base}/x-nmos/query/v1.0/subscriptions"))
        .json(&body)
        .send()
        .await
        .unwrap();
    (res.status().as_u16(), res.json().await.unwrap())
}

#[tokio::test]
async fn registrations_reach_a_filtered_subscriber() {
    let ctx = start_registry(|config| config.registry.ws_base = "ws://registry.example:3001".into()).await;
    let base = ctx.base_url();
    let client = HttpRegistryClient::new();
    let chain = chain("feed");
    client.register(&base, &chain.node.clone().into()).await.unwrap();

    let request = json!({
        "max_update_rate_ms": 0,
        "persist": false,
        "resource_path": "/devices/",
        "params": { "label": "feed-device" },
    });
    let (status, subscription) = create_subscription(&base, request.clone()).await;
    assert_eq!(status, 201);
    let id = subscription["id"].as_str().unwrap().to_string();
    assert_eq!(subscription["ws_href"], format!("ws://registry.example:3001/ws/?uid={id}"));
    let (status, again) = create_subscription(&base, request).await;
    assert_eq!(status, 200);
    assert_eq!(again["id"], id.as_str());

    let engine = ctx.ledger.engine().unwrap().clone();
    let mut connection = engine.connect(&id).unwrap();
    assert!(next(&mut connection.grains).await.is_empty());

    client.register(&base, &chain.device.clone().into()).await.unwrap();
    let added = next(&mut connection.grains).await;
    assert_eq!(added.grain.topic, "/devices/");
    assert!(added.grain.data[0].pre.is_none());
    assert_eq!(added.grain.data[0].path, chain.device.id);

    // Leaving the filter is still reported
    let renamed = chain.device.clone().with_label("elsewhere").bumped();
    client.register(&base, &renamed.into()).await.unwrap();
    let left = next(&mut connection.grains).await;
    assert_eq!(left.grain.data[0].post.as_ref().unwrap().label(), "elsewhere");

    drop(connection);
    let res = reqwest::get(format!("{base}/x-nmos/query/v1.0/subscriptions/{id}")).await.unwrap();
    assert_eq!(res.status().as_u16(), 404);

    ctx.shutdown().await;
}

#[tokio::test]
async fn bursts_are_coalesced_into_one_grain() {
    let ctx = start_registry(|_| {}).await;
    let base = ctx.base_url();
    let client = HttpRegistryClient::new();
    let chain = chain("burst");
    client.register(&base, &chain.node.clone().into()).await.unwrap();
    client.register(&base, &chain.device.clone().into()).await.unwrap();

    let (_, subscription) = create_subscription(
        &base,
        json!({
            "max_update_rate_ms": 300,
            "persist": true,
            "resource_path": "/sources",
            "params": {},
        }),
    )
    .await;
    let id = subscription["id"].as_str().unwrap();
    let mut connection = ctx.ledger.engine().unwrap().connect(id).unwrap();
    next(&mut connection.grains).await;

    let mut source = chain.source.clone();
    client.register(&base, &source.clone().into()).await.unwrap();
    for label in ["a", "b", "c"] {
        source = source.with_label(label).bumped();
        client.register(&base, &source.clone().into()).await.unwrap();
    }

    let mut records = 0;
    let mut grains = 0;
    while records < 4 {
        records += next(&mut connection.grains).await.len();
        grains += 1;
    }
    assert!(grains <= 2, "{grains} grains for one burst");

    drop(connection);
    let res = reqwest::Client::new()
        .delete(format!("{base}/x-nmos/query/v1.0/subscriptions/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 204);

    ctx.shutdown().await;
}
