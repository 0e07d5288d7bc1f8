//! Unit tests for `RelayBroker`.
//!
//! Exercise subscribe/publish/unsubscribe semantics directly, without a
//! transport layer: delivery order, multi-subscriber fan-out, and the
//! no-subscriber no-op.

use flowdeck_relay::{RelayBroker, RelayEvent, RelayEventKind, WORKFLOWS_TOPIC};

#[tokio::test]
async fn publish_reaches_a_subscriber_in_order() {
    let broker = RelayBroker::new();
    let mut rx = broker.subscribe(WORKFLOWS_TOPIC, "conn-1").await;

    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::running("c1", "sketch"))
        .await;
    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::progress("c1", "sketch", Some("p1"), 1.0))
        .await;

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.kind, RelayEventKind::Running);
    assert_eq!(second.kind, RelayEventKind::Progress);
}

#[tokio::test]
async fn every_subscriber_receives_every_event() {
    let broker = RelayBroker::new();
    let mut rx_a = broker.subscribe(WORKFLOWS_TOPIC, "conn-a").await;
    let mut rx_b = broker.subscribe(WORKFLOWS_TOPIC, "conn-b").await;

    // Addressed to one client, but the broker does not filter.
    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::running("client-a", "sketch"))
        .await;

    assert_eq!(rx_a.recv().await.unwrap().kind, RelayEventKind::Running);
    assert_eq!(rx_b.recv().await.unwrap().kind, RelayEventKind::Running);
}

#[tokio::test]
async fn publish_without_subscribers_is_a_noop() {
    let broker = RelayBroker::new();

    // Must not panic or block.
    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::state(0, 0))
        .await;

    assert_eq!(broker.subscriber_count(WORKFLOWS_TOPIC).await, 0);
}

#[tokio::test]
async fn unsubscribed_connection_stops_receiving() {
    let broker = RelayBroker::new();
    let mut rx = broker.subscribe(WORKFLOWS_TOPIC, "conn-1").await;

    broker.unsubscribe(WORKFLOWS_TOPIC, "conn-1").await;
    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::state(1, 1))
        .await;

    // Sender side was dropped on unsubscribe, so the channel ends.
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn topics_are_isolated() {
    let broker = RelayBroker::new();
    let mut rx = broker.subscribe("other", "conn-1").await;

    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::state(1, 0))
        .await;
    broker.publish("other", RelayEvent::state(2, 0)).await;

    let event = rx.recv().await.unwrap();
    assert_eq!(event.data["pending"], 2);
}

#[tokio::test]
async fn same_client_on_two_connections_keeps_both_subscriptions() {
    // Browser-reload race: a second socket for the same clientId opens
    // before the first closes. Distinct per-connection subscription ids
    // keep them independent; tearing down the old one must not evict
    // the live one.
    let broker = RelayBroker::new();
    let mut old_conn = broker.subscribe(WORKFLOWS_TOPIC, "conn-old").await;
    let mut new_conn = broker.subscribe(WORKFLOWS_TOPIC, "conn-new").await;
    assert_eq!(broker.subscriber_count(WORKFLOWS_TOPIC).await, 2);

    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::running("c1", "sketch"))
        .await;
    assert_eq!(old_conn.recv().await.unwrap().kind, RelayEventKind::Running);
    assert_eq!(new_conn.recv().await.unwrap().kind, RelayEventKind::Running);

    broker.unsubscribe(WORKFLOWS_TOPIC, "conn-old").await;
    assert_eq!(broker.subscriber_count(WORKFLOWS_TOPIC).await, 1);

    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::progress("c1", "sketch", Some("p1"), 50.0))
        .await;
    assert_eq!(new_conn.recv().await.unwrap().kind, RelayEventKind::Progress);
    assert!(old_conn.recv().await.is_none());
}

#[tokio::test]
async fn resubscribing_replaces_the_channel() {
    let broker = RelayBroker::new();
    let mut old_rx = broker.subscribe(WORKFLOWS_TOPIC, "conn-1").await;
    let mut new_rx = broker.subscribe(WORKFLOWS_TOPIC, "conn-1").await;

    broker
        .publish(WORKFLOWS_TOPIC, RelayEvent::state(3, 0))
        .await;

    assert_eq!(new_rx.recv().await.unwrap().data["pending"], 3);
    assert!(old_rx.recv().await.is_none());
    assert_eq!(broker.subscriber_count(WORKFLOWS_TOPIC).await, 1);
}
