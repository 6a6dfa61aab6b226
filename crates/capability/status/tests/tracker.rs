use domain::{
    ConnectorRecord, ConnectorSettings, DeviceRecord, Direction, GatewayRecord, HttpMethod,
    HttpSettings, Status,
};
use gw_status::StatusTracker;
use gw_storage::{ConfigStore, InMemoryConfigStore};
use std::sync::Arc;

fn connector(id: &str, direction: Direction, settings: ConnectorSettings) -> ConnectorRecord {
    ConnectorRecord {
        connector_id: id.to_string(),
        gateway_id: "g1".to_string(),
        name: id.to_string(),
        direction,
        interval: "60".to_string(),
        max_retained_samples: "100".to_string(),
        status: Status::Inactive,
        settings,
    }
}

fn device(id: &str) -> DeviceRecord {
    DeviceRecord {
        device_id: id.to_string(),
        connector_id: "in".to_string(),
        name: id.to_string(),
        host: "127.0.0.1".to_string(),
        port: 502,
        unit_id: 1,
        status: Status::Inactive,
    }
}

fn seeded() -> Arc<InMemoryConfigStore> {
    let store = Arc::new(InMemoryConfigStore::new());
    store
        .replace_gateway(
            GatewayRecord {
                gateway_id: "g1".to_string(),
                name: "gw".to_string(),
                status: Status::Inactive,
            },
            vec![
                connector("in", Direction::Inbound, ConnectorSettings::RegisterPoll),
                connector(
                    "out",
                    Direction::Outbound,
                    ConnectorSettings::Http(HttpSettings {
                        url: "http://localhost/x".to_string(),
                        method: HttpMethod::Post,
                    }),
                ),
            ],
            vec![device("d1"), device("d2"), device("d3")],
            vec![],
        )
        .expect("seed");
    store
}

#[tokio::test]
async fn one_active_device_keeps_connector_and_gateway_active() {
    let store = seeded();
    let tracker = StatusTracker::new(store.clone());

    let outcomes = vec![
        tracker.device_outcome("d1", true).await,
        tracker.device_outcome("d2", false).await,
        tracker.device_outcome("d3", false).await,
    ];
    assert_eq!(tracker.connector_cycle("in", &outcomes).await, Status::Active);
    assert_eq!(tracker.refresh_gateway("g1").await, Some(Status::Active));

    let devices = store.list_devices("in").await.expect("devices");
    let active: Vec<_> = devices.iter().filter(|d| d.status.is_active()).collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn all_inactive_flips_gateway_without_hysteresis() {
    let store = seeded();
    let tracker = StatusTracker::new(store.clone());

    tracker.connector_cycle("in", &[Status::Active]).await;
    assert_eq!(tracker.refresh_gateway("g1").await, Some(Status::Active));

    tracker
        .connector_cycle("in", &[Status::Inactive, Status::Inactive])
        .await;
    assert_eq!(tracker.refresh_gateway("g1").await, Some(Status::Inactive));

    // 仅出站连接可用时网关同样 active
    tracker.connection_state("out", true).await;
    assert_eq!(tracker.refresh_gateway("g1").await, Some(Status::Active));
    let gateway = store.find_gateway("g1").await.expect("find").expect("exists");
    assert_eq!(gateway.status, Status::Active);
}

#[tokio::test]
async fn empty_device_list_is_inactive() {
    let store = seeded();
    let tracker = StatusTracker::new(store);
    assert_eq!(tracker.connector_cycle("in", &[]).await, Status::Inactive);
}
