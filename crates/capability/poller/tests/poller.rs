use async_trait::async_trait;
use domain::{
    BusSettings, ByteOrder, ConnectorRecord, ConnectorSettings, DataType, DeviceRecord, Direction,
    GatewayRecord, HttpMethod, HttpSettings, SeriesRecord, Status, TopicSubscription,
};
use gw_forward::Forwarder;
use gw_ingest::{BridgeError, BusPublisher, PublisherRegistry};
use gw_pipeline::AggregateCache;
use gw_poller::SourcePoller;
use gw_protocol::{ProtocolError, RegisterEndpoint, RegisterReader, RegisterSession};
use gw_status::StatusTracker;
use gw_storage::{ConfigStore, InMemoryConfigStore, InMemorySampleStore, RetentionScope, SampleStore};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 按主机名返回寄存器表的假读取器
#[derive(Default)]
struct FakeReader {
    registers: HashMap<String, HashMap<u16, Vec<u16>>>,
    offline: HashSet<String>,
    connects: AtomicUsize,
}

impl FakeReader {
    fn with_device(mut self, host: &str, registers: &[(u16, &[u16])]) -> Self {
        self.registers.insert(
            host.to_string(),
            registers
                .iter()
                .map(|(address, words)| (*address, words.to_vec()))
                .collect(),
        );
        self
    }

    fn offline(mut self, host: &str) -> Self {
        self.offline.insert(host.to_string());
        self
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    registers: HashMap<u16, Vec<u16>>,
}

#[async_trait]
impl RegisterReader for FakeReader {
    async fn connect(
        &self,
        endpoint: &RegisterEndpoint,
    ) -> Result<Box<dyn RegisterSession>, ProtocolError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.offline.contains(&endpoint.host) {
            return Err(ProtocolError::Timeout(format!("connect {endpoint}")));
        }
        Ok(Box::new(FakeSession {
            registers: self.registers.get(&endpoint.host).cloned().unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl RegisterSession for FakeSession {
    async fn read_holding(&mut self, address: u16, count: u16) -> Result<Vec<u16>, ProtocolError> {
        let words = self
            .registers
            .get(&address)
            .ok_or_else(|| ProtocolError::Exception("IllegalDataAddress".to_string()))?;
        Ok(words.iter().take(usize::from(count)).copied().collect())
    }
}

fn modbus_connector(id: &str, interval: &str) -> ConnectorRecord {
    ConnectorRecord {
        connector_id: id.to_string(),
        gateway_id: "g1".to_string(),
        name: id.to_string(),
        direction: Direction::Inbound,
        interval: interval.to_string(),
        max_retained_samples: "100".to_string(),
        status: Status::Inactive,
        settings: ConnectorSettings::RegisterPoll,
    }
}

fn outbound(id: &str, settings: ConnectorSettings) -> ConnectorRecord {
    ConnectorRecord {
        connector_id: id.to_string(),
        gateway_id: "g1".to_string(),
        name: id.to_string(),
        direction: Direction::Outbound,
        interval: String::new(),
        max_retained_samples: "100".to_string(),
        status: Status::Inactive,
        settings,
    }
}

fn device(id: &str, connector_id: &str) -> DeviceRecord {
    DeviceRecord {
        device_id: id.to_string(),
        connector_id: connector_id.to_string(),
        name: format!("{id}-name"),
        host: id.to_string(),
        port: 502,
        unit_id: 1,
        status: Status::Inactive,
    }
}

fn series(id: &str, device_id: &str, address: u16, scale: f64) -> SeriesRecord {
    SeriesRecord {
        series_id: id.to_string(),
        device_id: device_id.to_string(),
        name: id.to_string(),
        scale,
        addresses: vec![address],
        data_type: DataType::Uint16,
        byte_order: ByteOrder::big_endian(),
    }
}

struct Harness {
    store: Arc<InMemoryConfigStore>,
    samples: Arc<InMemorySampleStore>,
    reader: Arc<FakeReader>,
    poller: SourcePoller,
    publishers: PublisherRegistry,
}

fn harness(
    connectors: Vec<ConnectorRecord>,
    devices: Vec<DeviceRecord>,
    series: Vec<SeriesRecord>,
    reader: FakeReader,
) -> Harness {
    let store = Arc::new(InMemoryConfigStore::new());
    store
        .replace_gateway(
            GatewayRecord {
                gateway_id: "g1".to_string(),
                name: "plant".to_string(),
                status: Status::Inactive,
            },
            connectors,
            devices,
            series,
        )
        .expect("seed");
    let samples = Arc::new(InMemorySampleStore::new());
    let reader = Arc::new(reader);
    let tracker = StatusTracker::new(store.clone());
    let publishers = PublisherRegistry::new();
    let forwarder = Forwarder::new(
        store.clone(),
        AggregateCache::new(),
        tracker.clone(),
        publishers.clone(),
        Duration::from_secs(2),
    )
    .expect("forwarder");
    let poller = SourcePoller::new(
        store.clone(),
        samples.clone(),
        reader.clone(),
        tracker,
        forwarder,
    );
    Harness {
        store,
        samples,
        reader,
        poller,
        publishers,
    }
}

async fn connector_status(store: &InMemoryConfigStore, id: &str) -> Status {
    store
        .find_connector(id)
        .await
        .expect("find")
        .expect("connector")
        .status
}

async fn device_status(store: &InMemoryConfigStore, connector_id: &str, id: &str) -> Status {
    store
        .list_devices(connector_id)
        .await
        .expect("devices")
        .into_iter()
        .find(|item| item.device_id == id)
        .expect("device")
        .status
}

#[tokio::test]
async fn polls_on_interval_and_scales_raw_registers() {
    let mut h = harness(
        vec![modbus_connector("m1", "60")],
        vec![device("d1", "m1")],
        vec![series("temp", "d1", 0, 0.1)],
        FakeReader::default().with_device("d1", &[(0, &[125])]),
    );

    let report = h.poller.run_cycle(0).await.expect("cycle");
    assert_eq!(report.polled, 1);
    let stored = h
        .samples
        .list_samples(&RetentionScope::Connector("m1".to_string()), 0)
        .await
        .expect("samples");
    assert_eq!(stored.len(), 1);
    assert!((stored[0].value - 12.5).abs() < 1e-9);
    assert_eq!(h.poller.due_table().next_due("m1"), Some(60_000));

    assert_eq!(h.poller.run_cycle(30_000).await.expect("cycle").polled, 0);
    assert_eq!(h.reader.connects(), 1);

    assert_eq!(h.poller.run_cycle(61_000).await.expect("cycle").polled, 1);
    assert_eq!(h.reader.connects(), 2);

    assert_eq!(device_status(&h.store, "m1", "d1").await, Status::Active);
    assert_eq!(connector_status(&h.store, "m1").await, Status::Active);
    let gateway = h.store.find_gateway("g1").await.expect("find").expect("gateway");
    assert_eq!(gateway.status, Status::Active);
}

#[tokio::test]
async fn failing_devices_and_series_are_isolated() {
    let mut h = harness(
        vec![modbus_connector("m1", "invalid")],
        vec![device("d1", "m1"), device("d2", "m1"), device("d3", "m1")],
        vec![
            series("a", "d1", 0, 1.0),
            series("missing", "d1", 9, 1.0),
            series("b", "d1", 1, 2.0),
            series("c", "d2", 0, 1.0),
        ],
        FakeReader::default()
            .with_device("d1", &[(0, &[10]), (1, &[20])])
            .offline("d2")
            .offline("d3"),
    );

    h.poller.run_cycle(0).await.expect("cycle");
    assert_eq!(h.reader.connects(), 3);
    // 非法间隔回退为 60 秒
    assert_eq!(h.poller.due_table().next_due("m1"), Some(60_000));

    let mut keys: Vec<(String, f64)> = h
        .samples
        .list_samples(&RetentionScope::Connector("m1".to_string()), 0)
        .await
        .expect("samples")
        .into_iter()
        .map(|item| (item.key, item.value))
        .collect();
    keys.sort_by(|left, right| left.0.cmp(&right.0));
    assert_eq!(keys, vec![("a".to_string(), 10.0), ("b".to_string(), 40.0)]);

    assert_eq!(device_status(&h.store, "m1", "d1").await, Status::Active);
    assert_eq!(device_status(&h.store, "m1", "d2").await, Status::Inactive);
    assert_eq!(device_status(&h.store, "m1", "d3").await, Status::Inactive);
    assert_eq!(connector_status(&h.store, "m1").await, Status::Active);
}

#[tokio::test]
async fn all_devices_down_marks_connector_inactive() {
    let mut h = harness(
        vec![modbus_connector("m1", "5")],
        vec![device("d1", "m1"), device("d2", "m1")],
        vec![],
        FakeReader::default().offline("d1").offline("d2"),
    );
    h.store
        .set_connector_status("m1", Status::Active)
        .await
        .expect("seed status");
    h.poller.run_cycle(0).await.expect("cycle");
    assert_eq!(connector_status(&h.store, "m1").await, Status::Inactive);
    let gateway = h.store.find_gateway("g1").await.expect("find").expect("gateway");
    assert_eq!(gateway.status, Status::Inactive);
}

#[tokio::test]
async fn connector_without_devices_is_a_no_op() {
    let mut h = harness(
        vec![modbus_connector("m1", "5")],
        vec![],
        vec![],
        FakeReader::default(),
    );
    h.store
        .set_connector_status("m1", Status::Active)
        .await
        .expect("seed status");
    let report = h.poller.run_cycle(0).await.expect("cycle");
    assert_eq!(report.polled, 1);
    assert_eq!(h.reader.connects(), 0);
    assert_eq!(connector_status(&h.store, "m1").await, Status::Active);
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl BusPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError> {
        let body: Value = serde_json::from_slice(&payload).expect("json payload");
        self.published
            .lock()
            .expect("lock")
            .push((topic.to_string(), body));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn device_values_are_pushed_to_every_outbound_sink() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let bus_out = outbound(
        "bus-out",
        ConnectorSettings::Bus(BusSettings {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            keepalive_secs: None,
            subscriptions: vec![TopicSubscription {
                subscription_id: "t1".to_string(),
                pattern: "plant/out".to_string(),
                devices: Vec::new(),
            }],
        }),
    );
    let http_out = outbound(
        "http-out",
        ConnectorSettings::Http(HttpSettings {
            url: format!("{}/push", server.uri()),
            method: HttpMethod::Post,
        }),
    );
    let mut h = harness(
        vec![modbus_connector("m1", "60"), bus_out, http_out],
        vec![device("d1", "m1")],
        vec![series("temp", "d1", 0, 0.1)],
        FakeReader::default().with_device("d1", &[(0, &[125])]),
    );
    let publisher = Arc::new(RecordingPublisher::default());
    h.publishers.register("bus-out", publisher.clone());

    h.poller.run_cycle(0).await.expect("cycle");

    let published = publisher.published.lock().expect("lock").clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "plant/out");
    assert_eq!(published[0].1["node"], json!("d1-name"));
    assert_eq!(published[0].1["group"], json!("m1"));
    assert_eq!(published[0].1["values"]["temp"], json!(12.5));

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().expect("json body");
    assert_eq!(
        body,
        json!({
            "gateway": "plant",
            "device": "d1-name",
            "connector_id": "m1",
            "values": {"temp": 12.5},
        })
    );

    assert_eq!(connector_status(&h.store, "bus-out").await, Status::Active);
    assert_eq!(connector_status(&h.store, "http-out").await, Status::Inactive);
    assert_eq!(connector_status(&h.store, "m1").await, Status::Active);
}
