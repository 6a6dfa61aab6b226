use domain::{
    BusDevice, BusKey, BusSettings, ConnectorRecord, ConnectorSettings, Direction, Status,
    TopicSubscription, ValueType,
};
use gw_ingest::{BusMessageHandler, MessageOutcome, PublisherRegistry};
use gw_pipeline::AggregateCache;
use gw_storage::{InMemorySampleStore, RetentionScope, SampleStore};
use std::sync::Arc;

fn key(device_id: &str, name: &str) -> BusKey {
    BusKey {
        series_id: format!("{device_id}-{name}"),
        key: name.to_string(),
        value_type: ValueType::Double,
    }
}

fn bus_connector(max_samples: &str) -> ConnectorRecord {
    ConnectorRecord {
        connector_id: "bus-in".to_string(),
        gateway_id: "g1".to_string(),
        name: "plant-bus".to_string(),
        direction: Direction::Inbound,
        interval: "30".to_string(),
        max_retained_samples: max_samples.to_string(),
        status: Status::Inactive,
        settings: ConnectorSettings::Bus(BusSettings {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            keepalive_secs: None,
            subscriptions: vec![TopicSubscription {
                subscription_id: "sub-1".to_string(),
                pattern: "sensor/+/data".to_string(),
                devices: vec![BusDevice {
                    device_id: "dev-a".to_string(),
                    device_name: "A".to_string(),
                    keys: vec![key("dev-a", "t"), key("dev-a", "state")],
                }],
            }],
        }),
    }
}

struct Harness {
    handler: BusMessageHandler,
    samples: Arc<InMemorySampleStore>,
    cache: AggregateCache,
}

async fn harness() -> Harness {
    let samples = Arc::new(InMemorySampleStore::new());
    let cache = AggregateCache::new();
    cache.subscribe("sink", ["bus-in".to_string()]).await;
    Harness {
        handler: BusMessageHandler::new(samples.clone(), cache.clone()),
        samples,
        cache,
    }
}

#[tokio::test]
async fn allow_list_filters_keys() {
    let h = harness().await;
    let connector = bus_connector("100");
    let outcome = h
        .handler
        .handle(
            &connector,
            "sensor/7/data",
            br#"{"node":"A","timestamp":1000,"values":{"t":21.5,"h":40}}"#,
        )
        .await;
    assert_eq!(
        outcome,
        MessageOutcome::Accepted {
            device_id: "dev-a".to_string(),
            accepted: 1,
            rejected: 1,
            decode_failures: 0,
        }
    );

    let stored = h
        .samples
        .list_samples(&RetentionScope::Device("dev-a".to_string()), 0)
        .await
        .expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key, "t");
    assert_eq!(stored[0].series_id, "dev-a-t");
    assert_eq!(stored[0].ts_ms, 1000);

    let payload = h.cache.drain("sink").await.expect("payload");
    let values = payload.data.get("A").expect("device A");
    assert_eq!(values.get("t"), Some(&21.5));
    assert!(values.get("h").is_none());
}

#[tokio::test]
async fn unmatched_topic_and_undeclared_device_are_dropped() {
    let h = harness().await;
    let connector = bus_connector("100");

    let outcome = h
        .handler
        .handle(&connector, "sensor/7/8/data", br#"{"node":"A","values":{"t":1}}"#)
        .await;
    assert_eq!(outcome, MessageOutcome::DroppedUnmatchedTopic);

    let outcome = h
        .handler
        .handle(&connector, "sensor/7/data", br#"{"node":"B","values":{"t":1}}"#)
        .await;
    assert_eq!(outcome, MessageOutcome::DroppedUndeclaredDevice);

    let outcome = h.handler.handle(&connector, "sensor/7/data", b"garbage").await;
    assert_eq!(outcome, MessageOutcome::DecodeFailed);

    assert!(h.cache.drain("sink").await.is_none());
    assert_eq!(h.samples.count(&RetentionScope::Device("dev-a".to_string())), 0);
}

#[tokio::test]
async fn non_numeric_values_are_skipped() {
    let h = harness().await;
    let connector = bus_connector("100");
    let outcome = h
        .handler
        .handle(
            &connector,
            "sensor/1/data",
            br#"{"node":"A","values":{"t":"abc","state":true}}"#,
        )
        .await;
    assert_eq!(
        outcome,
        MessageOutcome::Accepted {
            device_id: "dev-a".to_string(),
            accepted: 1,
            rejected: 0,
            decode_failures: 1,
        }
    );
    let payload = h.cache.drain("sink").await.expect("payload");
    assert_eq!(payload.data["A"].get("state"), Some(&1.0));
}

#[tokio::test]
async fn bus_samples_respect_device_retention() {
    let h = harness().await;
    let connector = bus_connector("3");
    for ts in 0..10 {
        let body = format!(r#"{{"node":"A","timestamp":{ts},"values":{{"t":{ts}}}}}"#);
        h.handler
            .handle(&connector, "sensor/x/data", body.as_bytes())
            .await;
    }
    let stored = h
        .samples
        .list_samples(&RetentionScope::Device("dev-a".to_string()), 0)
        .await
        .expect("list");
    let timestamps: Vec<i64> = stored.iter().map(|item| item.ts_ms).collect();
    assert_eq!(timestamps, vec![9, 8, 7]);
}

#[test]
fn registry_starts_empty() {
    let registry = PublisherRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.get("missing").is_none());
}
