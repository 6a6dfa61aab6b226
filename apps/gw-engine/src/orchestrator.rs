//! 网关编排器
//!
//! 持有全部数据面循环的句柄：一个源轮询循环、每个总线连接器一条链路、
//! 每个出站连接器一个转发任务，共用一个 `CancellationToken`。
//! 重启 = 停止并等待全部任务结束后再启动，同一时刻最多一组实例存活。

use domain::{ConnectorKind, ConnectorRecord};
use gw_config::AppConfig;
use gw_forward::{ForwardError, Forwarder, spawn_forwarder};
use gw_ingest::{BusLinkConfig, BusLinkContext, BusMessageHandler, PublisherRegistry, spawn_bus_link};
use gw_pipeline::AggregateCache;
use gw_poller::{SourcePoller, spawn_poller};
use gw_protocol::RegisterReader;
use gw_status::StatusTracker;
use gw_storage::{ConfigStore, SampleStore, StorageError};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 编排错误。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Forward(#[from] ForwardError),
    #[error("engine already running")]
    AlreadyRunning,
}

/// 数据面运行参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_tick: Duration,
    pub http_timeout: Duration,
    pub bus: BusLinkConfig,
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            poll_tick: Duration::from_secs(config.poll_tick_seconds),
            http_timeout: Duration::from_millis(config.http_timeout_ms),
            bus: BusLinkConfig {
                default_keepalive_secs: config.mqtt_keepalive_seconds,
                backoff_initial: Duration::from_millis(config.mqtt_backoff_initial_ms),
                backoff_max: Duration::from_millis(config.mqtt_backoff_max_ms),
                alert_after_failures: config.mqtt_alert_after_failures,
                ..BusLinkConfig::default()
            },
        }
    }
}

struct Running {
    cancel: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
    fingerprint: u64,
}

/// 网关编排器
pub struct Orchestrator {
    store: Arc<dyn ConfigStore>,
    samples: Arc<dyn SampleStore>,
    reader: Arc<dyn RegisterReader>,
    settings: EngineSettings,
    tracker: StatusTracker,
    cache: AggregateCache,
    publishers: PublisherRegistry,
    forwarder: Forwarder,
    running: Mutex<Option<Running>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        samples: Arc<dyn SampleStore>,
        reader: Arc<dyn RegisterReader>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let tracker = StatusTracker::new(store.clone());
        let cache = AggregateCache::new();
        let publishers = PublisherRegistry::new();
        let forwarder = Forwarder::new(
            store.clone(),
            cache.clone(),
            tracker.clone(),
            publishers.clone(),
            settings.http_timeout,
        )?;
        Ok(Self {
            store,
            samples,
            reader,
            settings,
            tracker,
            cache,
            publishers,
            forwarder,
            running: Mutex::new(None),
        })
    }

    /// 启动全部循环，返回启动的任务数。
    pub async fn start(&self) -> Result<usize, EngineError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        let started = self.spawn_all().await?;
        let count = started.handles.len();
        *running = Some(started);
        Ok(count)
    }

    /// 取消并等待全部任务结束，返回结束的任务数。
    pub async fn stop(&self) -> usize {
        let mut running = self.running.lock().await;
        Self::join_all(running.take()).await
    }

    /// 停止后重新启动，期间持有生命周期锁。
    pub async fn restart(&self) -> Result<usize, EngineError> {
        let mut running = self.running.lock().await;
        Self::join_all(running.take()).await;
        let started = self.spawn_all().await?;
        let count = started.handles.len();
        *running = Some(started);
        info!(target: "gw.engine", loops = count, "engine_restarted");
        Ok(count)
    }

    /// 仍在运行的任务数
    pub async fn active_loops(&self) -> usize {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|item| {
                item.handles
                    .iter()
                    .filter(|(_, handle)| !handle.is_finished())
                    .count()
            })
            .unwrap_or(0)
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// 周期性比较连接器指纹，变化时重启；`cancel` 结束监视本身。
    pub fn supervise(self: Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(period) => {}
                }
                if let Err(err) = self.check_config().await {
                    warn!(target: "gw.engine", error = %err, "supervise_check_failed");
                }
            }
        })
    }

    /// 配置指纹变化时重启，返回是否重启。
    pub async fn check_config(&self) -> Result<bool, EngineError> {
        let current = fingerprint(&self.store.list_connectors().await?);
        let previous = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|item| item.fingerprint);
        match previous {
            Some(previous) if previous != current => {
                info!(target: "gw.engine", "config_changed");
                self.restart().await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn spawn_all(&self) -> Result<Running, EngineError> {
        let connectors = self.store.list_connectors().await?;
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        let poller = SourcePoller::new(
            self.store.clone(),
            self.samples.clone(),
            self.reader.clone(),
            self.tracker.clone(),
            self.forwarder.clone(),
        );
        handles.push((
            "poller".to_string(),
            spawn_poller(poller, self.settings.poll_tick, cancel.clone()),
        ));

        let context = BusLinkContext {
            handler: BusMessageHandler::new(self.samples.clone(), self.cache.clone()),
            tracker: self.tracker.clone(),
            publishers: self.publishers.clone(),
        };
        for connector in connectors.iter().filter(|item| item.kind() == ConnectorKind::Bus) {
            match spawn_bus_link(
                connector.clone(),
                context.clone(),
                self.settings.bus.clone(),
                cancel.clone(),
            ) {
                Ok(handle) => handles.push((format!("bus:{}", connector.connector_id), handle)),
                Err(err) => warn!(
                    target: "gw.engine",
                    connector_id = %connector.connector_id,
                    error = %err,
                    "bus_link_spawn_failed"
                ),
            }
        }

        for connector in connectors.iter().filter(|item| !item.is_inbound()) {
            handles.push((
                format!("forward:{}", connector.connector_id),
                spawn_forwarder(
                    self.forwarder.clone(),
                    connector.connector_id.clone(),
                    cancel.clone(),
                ),
            ));
        }

        info!(
            target: "gw.engine",
            loops = handles.len(),
            connectors = connectors.len(),
            "engine_started"
        );
        Ok(Running {
            cancel,
            handles,
            fingerprint: fingerprint(&connectors),
        })
    }

    async fn join_all(running: Option<Running>) -> usize {
        let Some(running) = running else {
            return 0;
        };
        running.cancel.cancel();
        let mut joined = 0;
        for (name, handle) in running.handles {
            join_task(&name, handle).await;
            joined += 1;
        }
        info!(target: "gw.engine", joined, "engine_stopped");
        joined
    }
}

/// 等待任务结束；任务 panic 或被中止时记录告警并返回 `false`。
pub async fn join_task(name: &str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(err) => {
            warn!(target: "gw.engine", task = %name, error = %err, "task_join_failed");
            false
        }
    }
}

/// 连接器拓扑指纹：标识、方向、配置与保留上限，不含状态与间隔（间隔每周期重新读取）。
pub fn fingerprint(connectors: &[ConnectorRecord]) -> u64 {
    let mut sorted: Vec<&ConnectorRecord> = connectors.iter().collect();
    sorted.sort_by(|left, right| left.connector_id.cmp(&right.connector_id));
    let mut hasher = DefaultHasher::new();
    for connector in sorted {
        connector.connector_id.hash(&mut hasher);
        connector.gateway_id.hash(&mut hasher);
        connector.direction.hash(&mut hasher);
        connector.max_retained_samples.hash(&mut hasher);
        connector.settings.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{
        ConnectorSettings, Direction, GatewayRecord, HttpMethod, HttpSettings, Status,
    };
    use gw_protocol::{ModbusTcpConfig, ModbusTcpReader};
    use gw_storage::{InMemoryConfigStore, InMemorySampleStore};

    fn http_sink(id: &str, url: &str) -> ConnectorRecord {
        ConnectorRecord {
            connector_id: id.to_string(),
            gateway_id: "g1".to_string(),
            name: id.to_string(),
            direction: Direction::Outbound,
            interval: String::new(),
            max_retained_samples: "100".to_string(),
            status: Status::Inactive,
            settings: ConnectorSettings::Http(HttpSettings {
                url: url.to_string(),
                method: HttpMethod::Post,
            }),
        }
    }

    fn orchestrator(store: Arc<InMemoryConfigStore>) -> Orchestrator {
        Orchestrator::new(
            store,
            Arc::new(InMemorySampleStore::new()),
            Arc::new(ModbusTcpReader::new(ModbusTcpConfig::default())),
            EngineSettings {
                poll_tick: Duration::from_secs(3600),
                http_timeout: Duration::from_secs(1),
                bus: BusLinkConfig::default(),
            },
        )
        .expect("orchestrator")
    }

    fn seeded_store() -> Arc<InMemoryConfigStore> {
        let store = Arc::new(InMemoryConfigStore::new());
        store
            .replace_gateway(
                GatewayRecord {
                    gateway_id: "g1".to_string(),
                    name: "plant".to_string(),
                    status: Status::Inactive,
                },
                vec![http_sink("out-1", "http://127.0.0.1:9/push")],
                Vec::new(),
                Vec::new(),
            )
            .expect("seed");
        store
    }

    #[tokio::test]
    async fn join_task_reports_failed_tasks() {
        assert!(join_task("ok", tokio::spawn(async {})).await);
        let aborted = tokio::spawn(std::future::pending::<()>());
        aborted.abort();
        assert!(!join_task("aborted", aborted).await);
    }

    #[tokio::test]
    async fn restart_never_doubles_loops() {
        let engine = orchestrator(seeded_store());
        assert_eq!(engine.start().await.expect("start"), 2);
        assert_eq!(engine.active_loops().await, 2);
        assert!(matches!(engine.start().await, Err(EngineError::AlreadyRunning)));

        assert_eq!(engine.restart().await.expect("restart"), 2);
        assert_eq!(engine.active_loops().await, 2);

        assert_eq!(engine.stop().await, 2);
        assert_eq!(engine.active_loops().await, 0);
        assert!(!engine.is_running().await);
        assert_eq!(engine.stop().await, 0);
    }

    #[tokio::test]
    async fn config_change_triggers_restart() {
        let store = seeded_store();
        let engine = orchestrator(store.clone());
        engine.start().await.expect("start");
        assert!(!engine.check_config().await.expect("check"));

        // 仅状态变化不算配置变化
        store
            .set_connector_status("out-1", Status::Active)
            .await
            .expect("status");
        assert!(!engine.check_config().await.expect("check"));

        store
            .upsert_connector(http_sink("out-2", "http://127.0.0.1:9/other"))
            .expect("upsert");
        assert!(engine.check_config().await.expect("check"));
        assert_eq!(engine.active_loops().await, 3);
        assert!(!engine.check_config().await.expect("check"));
        engine.stop().await;
    }

    #[test]
    fn fingerprint_ignores_order_and_status() {
        let mut first = http_sink("a", "http://x/1");
        let second = http_sink("b", "http://x/2");
        let left = fingerprint(&[first.clone(), second.clone()]);
        first.status = Status::Active;
        first.interval = "15".to_string();
        let right = fingerprint(&[second, first]);
        assert_eq!(left, right);
    }
}
