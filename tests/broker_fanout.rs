//! Broker Fan-out Tests
//!
//! - every subscriber sees every event, in sequence order
//! - a listener that goes away never blocks publishers
//! - a subscriber that stops reading is evicted, others are unaffected

use std::sync::Arc;
use std::time::Duration;

use docbrew::realtime::{Broker, BrokerConfig, ChangeEvent, EventKind};
use docbrew::service::DocumentService;
use docbrew::storage::MemoryBackend;
use serde_json::json;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_subscriber_sees_every_write() {
    const SUBSCRIBERS: usize = 4;
    const WRITES: usize = 50;

    let broker = Broker::new(BrokerConfig {
        queue_capacity: WRITES * 2,
    });
    let service = DocumentService::new(Arc::new(MemoryBackend::new()), broker.clone());

    let mut readers = Vec::new();
    for _ in 0..SUBSCRIBERS {
        let mut subscriber = service.subscribe();
        readers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            while seen.len() < WRITES {
                match timeout(WAIT, subscriber.recv()).await {
                    Ok(Some(event)) => seen.push(event),
                    _ => break,
                }
            }
            seen
        }));
    }

    // A listener that disconnects after the first event
    let mut quitter = service.subscribe();

    let writer = {
        let service = service.clone();
        tokio::spawn(async move {
            for i in 0..WRITES {
                let body = format!(r#"{{"i":{}}}"#, i);
                service
                    .upsert("events", &format!("k{}", i), body.as_bytes())
                    .await
                    .unwrap();
            }
        })
    };

    let first = timeout(WAIT, quitter.recv()).await.unwrap().unwrap();
    assert_eq!(first.event_kind, EventKind::ItemAdded);
    drop(quitter);

    writer.await.unwrap();

    for reader in readers {
        let seen = reader.await.unwrap();
        assert_eq!(seen.len(), WRITES);
        assert!(seen.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert!(seen.iter().all(|e| e.namespace == "events"));
        assert_eq!(seen[7].key.as_deref(), Some("k7"));
        assert_eq!(seen[7].value, Some(json!({"i": 7})));
    }

    assert_eq!(broker.subscriber_count(), 0);
}

#[tokio::test]
async fn test_dropped_subscriber_is_pruned() {
    let broker = Broker::default();
    let keep = broker.subscribe();
    let gone = broker.subscribe();
    assert_eq!(broker.subscriber_count(), 2);

    drop(gone);
    let result = broker.publish(ChangeEvent::namespace_deleted("ns"));
    assert_eq!(result.delivered, 1);
    assert_eq!(broker.subscriber_count(), 1);
    drop(keep);
}

#[tokio::test]
async fn test_slow_subscriber_evicted() {
    let broker = Broker::new(BrokerConfig { queue_capacity: 2 });
    let mut slow = broker.subscribe();
    let mut fast = broker.subscribe();

    let mut evicted = 0;
    for i in 0..5 {
        let result = broker.publish(ChangeEvent::item_added("ns", i.to_string(), json!(i)));
        evicted += result.evicted;
        // fast keeps up
        assert!(fast.try_recv().is_some());
    }

    assert_eq!(evicted, 1);
    assert!(slow.was_evicted());
    assert!(!fast.was_evicted());

    // Queued events drain, then the stream ends
    assert_eq!(slow.recv().await.unwrap().sequence, 1);
    assert_eq!(slow.recv().await.unwrap().sequence, 2);
    assert!(slow.recv().await.is_none());
}

#[tokio::test]
async fn test_failed_write_publishes_nothing() {
    let service = DocumentService::new(Arc::new(MemoryBackend::new()), Broker::default());
    let mut subscriber = service.subscribe();

    assert!(service.upsert("ns", "1", b"not json").await.is_err());
    assert!(service.delete("ns", "missing").await.is_err());
    assert!(service.delete_all("missing").await.is_err());
    assert!(subscriber.try_recv().is_none());
}

#[tokio::test]
async fn test_close_all_ends_streams() {
    let broker = Broker::default();
    let mut subscriber = broker.subscribe();
    broker.close_all();
    assert!(timeout(WAIT, subscriber.recv()).await.unwrap().is_none());
    assert!(!subscriber.was_evicted());
}
