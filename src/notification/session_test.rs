use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::advance;
use tokio::time::Instant;

use super::session::Session;
use super::*;
use crate::test_utils::Chain;
use crate::ChangeRecord;
use crate::Labeled;
use crate::ResourceKind;

struct Harness {
    records: mpsc::UnboundedSender<Vec<ChangeRecord>>,
    grains: mpsc::UnboundedReceiver<Grain>,
}

fn start(max_update_rate_ms: u64) -> Harness {
    let (records, inbound) = mpsc::unbounded_channel();
    let (outbound, grains) = mpsc::unbounded_channel();
    let session = Session {
        source_id: "query".into(),
        subscription_id: "sub".into(),
        kind: ResourceKind::Device,
        min_interval: Duration::from_millis(max_update_rate_ms),
        inbound,
        outbound,
    };
    tokio::spawn(session.run(vec![]));
    Harness { records, grains }
}

fn change(label: &str) -> Vec<ChangeRecord> {
    vec![ChangeRecord::new(None, Some(Chain::new().device.with_label(label).into()))]
}

#[tokio::test(start_paused = true)]
async fn burst_inside_the_window_is_one_grain() {
    let mut h = start(100);
    let initial = h.grains.recv().await.unwrap();
    let snapshot_sent = Instant::now();
    assert!(initial.is_empty());

    advance(Duration::from_millis(1)).await;
    h.records.send(change("first")).unwrap();
    advance(Duration::from_millis(9)).await;
    h.records.send(change("second")).unwrap();

    let grain = h.grains.recv().await.unwrap();

    assert!(snapshot_sent.elapsed() >= Duration::from_millis(100));
    let labels: Vec<_> = grain
        .grain
        .data
        .iter()
        .map(|r| r.post.as_ref().unwrap().label().to_string())
        .collect();
    assert_eq!(labels, vec!["first", "second"]);
    assert!(h.grains.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn change_after_the_window_goes_out_at_once() {
    let mut h = start(100);
    h.grains.recv().await.unwrap();

    advance(Duration::from_millis(150)).await;
    let sent = Instant::now();
    h.records.send(change("late")).unwrap();
    let grain = h.grains.recv().await.unwrap();

    assert_eq!(sent.elapsed(), Duration::ZERO);
    assert_eq!(grain.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_rate_never_batches() {
    let mut h = start(0);
    h.grains.recv().await.unwrap();

    h.records.send(change("a")).unwrap();
    h.records.send(change("b")).unwrap();

    assert_eq!(h.grains.recv().await.unwrap().len(), 1);
    assert_eq!(h.grains.recv().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn windows_restart_after_each_flush() {
    let mut h = start(100);
    h.grains.recv().await.unwrap();

    h.records.send(change("a")).unwrap();
    h.grains.recv().await.unwrap();
    let first_flush = Instant::now();

    h.records.send(change("b")).unwrap();
    h.grains.recv().await.unwrap();

    assert!(first_flush.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn session_ends_when_inbound_closes() {
    let (records, inbound) = mpsc::unbounded_channel::<Vec<ChangeRecord>>();
    let (outbound, mut grains) = mpsc::unbounded_channel();
    let session = Session {
        source_id: "query".into(),
        subscription_id: "sub".into(),
        kind: ResourceKind::Node,
        min_interval: Duration::ZERO,
        inbound,
        outbound,
    };
    let task = tokio::spawn(session.run(vec![]));

    drop(records);
    task.await.unwrap();

    assert!(grains.recv().await.is_some());
    assert!(grains.recv().await.is_none());
}
