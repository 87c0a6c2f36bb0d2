use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::time::timeout;

use super::*;
use crate::test_utils::Chain;
use crate::Error;
use crate::EventBus;
use crate::Identified;
use crate::Labeled;
use crate::Store;
use crate::StoreHandle;
use crate::SubscriptionError;
use crate::Versioned;

async fn running_engine() -> (NotificationEngine, StoreHandle, Chain, watch::Sender<()>) {
    let store = StoreHandle::spawn(Store::registry(), EventBus::new());
    let chain = Chain::new();
    for resource in chain.resources() {
        store.put(resource).await.unwrap();
    }
    let engine = NotificationEngine::new(store.clone(), "ws://registry:3001");
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(engine.clone().run(shutdown_rx));
    (engine, store, chain, shutdown_tx)
}

fn subscribe(
    engine: &NotificationEngine,
    path: &str,
    params: serde_json::Value,
    persist: bool,
) -> Subscription {
    let request = json!({
        "max_update_rate_ms": 0,
        "persist": persist,
        "resource_path": path,
        "params": params,
    });
    engine.create_subscription(&request).unwrap().0
}

async fn next(connection: &mut Connection) -> Grain {
    timeout(Duration::from_secs(1), connection.grains.recv())
        .await
        .expect("grain in time")
        .expect("connection open")
}

#[tokio::test]
async fn first_grain_is_the_matching_collection() {
    let (engine, store, chain, _shutdown) = running_engine().await;
    store.put(chain.sender()).await.unwrap();
    let subscription = subscribe(&engine, "/flows", json!({}), false);

    let mut connection = engine.connect(&subscription.id).unwrap();
    let grain = next(&mut connection).await;

    assert_eq!(grain.grain.topic, "/flows/");
    assert_eq!(grain.flow_id, subscription.id);
    assert_eq!(grain.source_id, engine.source_id());
    assert_eq!(grain.len(), 1);
    let record = &grain.grain.data[0];
    assert_eq!(record.path, chain.flow.id);
    assert_eq!(record.pre, record.post);
}

#[tokio::test]
async fn changes_on_the_topic_are_delivered() {
    let (engine, store, chain, _shutdown) = running_engine().await;
    let subscription = subscribe(&engine, "/sources", json!({}), false);
    let mut connection = engine.connect(&subscription.id).unwrap();
    next(&mut connection).await;

    store.put(chain.flow.clone().with_label("ignored").bumped()).await.unwrap();
    store.put(chain.source.clone().with_label("seen").bumped()).await.unwrap();

    let grain = next(&mut connection).await;
    assert_eq!(grain.grain.topic, "/sources/");
    let record = &grain.grain.data[0];
    assert_eq!(record.pre.as_ref().unwrap().label(), "source");
    assert_eq!(record.post.as_ref().unwrap().label(), "seen");
}

#[tokio::test]
async fn filter_follows_resources_in_and_out() {
    let (engine, store, chain, _shutdown) = running_engine().await;
    let subscription = subscribe(&engine, "/devices", json!({"label": "X"}), false);
    let mut connection = engine.connect(&subscription.id).unwrap();
    assert!(next(&mut connection).await.is_empty());

    let into = chain.device.clone().with_label("X").bumped();
    store.put(into.clone()).await.unwrap();
    let out_of = into.clone().with_label("Y").bumped();
    store.put(out_of.clone()).await.unwrap();
    store.put(out_of.clone().with_label("Z").bumped()).await.unwrap();
    let marker = into.with_label("X").bumped();
    store.put(marker.clone()).await.unwrap();

    let mut labels = vec![];
    while labels.len() < 3 {
        for record in next(&mut connection).await.grain.data {
            labels.push(record.post.unwrap().label().to_string());
        }
    }
    // Y -> Z never matched
    assert_eq!(labels, vec!["X", "Y", "X"]);
}

#[tokio::test]
async fn last_connection_removes_a_transient_subscription() {
    let (engine, _store, _chain, _shutdown) = running_engine().await;
    let subscription = subscribe(&engine, "/nodes", json!({}), false);

    let first = engine.connect(&subscription.id).unwrap();
    let second = engine.connect(&subscription.id).unwrap();
    assert_eq!(engine.connection_count(&subscription.id), 2);

    drop(first);
    assert!(engine.subscription(&subscription.id).is_ok());

    drop(second);
    let err = engine.subscription(&subscription.id).unwrap_err();
    assert!(matches!(err, Error::Subscription(SubscriptionError::NotFound(_))));
}

#[tokio::test]
async fn persistent_subscription_outlives_its_connections() {
    let (engine, _store, _chain, _shutdown) = running_engine().await;
    let subscription = subscribe(&engine, "/nodes", json!({}), true);

    drop(engine.connect(&subscription.id).unwrap());

    assert!(engine.subscription(&subscription.id).is_ok());
    engine.delete_subscription(&subscription.id).unwrap();
    assert!(engine.subscriptions().is_empty());
}

#[tokio::test]
async fn connecting_to_an_unknown_subscription_fails() {
    let (engine, _store, _chain, _shutdown) = running_engine().await;

    let err = engine.connect(&crate::generate_id()).err().unwrap();

    assert!(matches!(err, Error::Subscription(SubscriptionError::NotFound(_))));
}

#[tokio::test]
async fn deletions_reach_subscribers() {
    let (engine, store, chain, _shutdown) = running_engine().await;
    let subscription = subscribe(&engine, "/flows/", json!({}), false);
    let mut connection = engine.connect(&subscription.id).unwrap();
    next(&mut connection).await;

    store.delete(crate::ResourceKind::Flow, &chain.flow.id).await.unwrap();

    let grain = next(&mut connection).await;
    let record = &grain.grain.data[0];
    assert_eq!(record.pre.as_ref().unwrap().id(), chain.flow.id);
    assert!(record.post.is_none());
}
