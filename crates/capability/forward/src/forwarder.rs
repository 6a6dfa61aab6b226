//! 出站转发
//!
//! 两条路径：
//! - 寄存器轮询数据：每台设备同步推送到同网关的全部出站连接器，不经缓存
//! - 总线数据：每个出站连接器一个任务，按入站间隔读取并清空自己的缓存通道后推送
//!
//! 推送结果直接决定出站连接器状态：成功 active，失败 inactive，不重试。

use crate::error::ForwardError;
use crate::sink::{BusSink, HttpSink, Sink};
use domain::{ConnectorRecord, ConnectorSettings, DEFAULT_INTERVAL_SECS, DeviceValues};
use gw_ingest::PublisherRegistry;
use gw_pipeline::AggregateCache;
use gw_status::StatusTracker;
use gw_storage::ConfigStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 一台设备一次轮询得到的值
#[derive(Debug, Clone)]
pub struct DevicePush<'a> {
    pub gateway_name: &'a str,
    /// 产生数据的入站连接器
    pub source_connector_id: &'a str,
    pub device_name: &'a str,
    pub values: &'a DeviceValues,
    pub timestamp: i64,
}

impl DevicePush<'_> {
    /// HTTP 目标的设备推送 body
    pub fn http_body(&self) -> Value {
        json!({
            "gateway": self.gateway_name,
            "device": self.device_name,
            "connector_id": self.source_connector_id,
            "values": self.values,
        })
    }

    /// 总线目标的设备推送信封
    pub fn bus_envelope(&self) -> Value {
        json!({
            "node": self.device_name,
            "group": self.source_connector_id,
            "timestamp": self.timestamp,
            "values": self.values,
            "errors": {},
        })
    }
}

/// 一次缓存转发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// 通道为空，本次不推送
    Empty,
    Delivered { devices: usize, values: usize },
    /// 推送失败，已清空的数据丢弃
    Failed { devices: usize, values: usize },
}

/// 出站转发器（可克隆，内部共享）
#[derive(Clone)]
pub struct Forwarder {
    store: Arc<dyn ConfigStore>,
    cache: AggregateCache,
    tracker: StatusTracker,
    publishers: PublisherRegistry,
    http: reqwest::Client,
}

impl Forwarder {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        cache: AggregateCache,
        tracker: StatusTracker,
        publishers: PublisherRegistry,
        http_timeout: Duration,
    ) -> Result<Self, ForwardError> {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|err| ForwardError::Configuration(err.to_string()))?;
        Ok(Self {
            store,
            cache,
            tracker,
            publishers,
            http,
        })
    }

    pub fn cache(&self) -> &AggregateCache {
        &self.cache
    }

    /// 按连接器类型构造出站目标。
    pub fn sink_for(&self, connector: &ConnectorRecord) -> Result<Box<dyn Sink>, ForwardError> {
        match &connector.settings {
            ConnectorSettings::Http(settings) => {
                Ok(Box::new(HttpSink::new(self.http.clone(), settings.clone())))
            }
            ConnectorSettings::Bus(settings) => Ok(Box::new(BusSink::new(
                &connector.connector_id,
                settings,
                self.publishers.clone(),
            ))),
            ConnectorSettings::RegisterPoll => Err(ForwardError::Configuration(format!(
                "connector {} cannot be an outbound sink",
                connector.connector_id
            ))),
        }
    }

    /// 把一台设备的值同步推送到每个出站连接器，返回成功数。
    pub async fn push_device(&self, sinks: &[ConnectorRecord], push: &DevicePush<'_>) -> usize {
        let mut delivered = 0;
        for sink in sinks.iter().filter(|item| !item.is_inbound()) {
            let payload = match sink.settings {
                ConnectorSettings::Bus(_) => push.bus_envelope(),
                _ => push.http_body(),
            };
            if self.deliver(sink, &payload).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// 读取并清空出站连接器的缓存通道，非空时推送。
    pub async fn forward_once(&self, sink: &ConnectorRecord) -> ForwardOutcome {
        let Some(payload) = self.cache.drain(&sink.connector_id).await else {
            debug!(
                target: "gw.forward",
                connector_id = %sink.connector_id,
                "forward_cache_empty"
            );
            return ForwardOutcome::Empty;
        };
        let devices = payload.data.len();
        let values = payload.value_count();
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(err) => {
                warn!(
                    target: "gw.forward",
                    connector_id = %sink.connector_id,
                    error = %err,
                    "forward_payload_encode_failed"
                );
                return ForwardOutcome::Failed { devices, values };
            }
        };
        let outcome = if self.deliver(sink, &body).await {
            ForwardOutcome::Delivered { devices, values }
        } else {
            warn!(
                target: "gw.forward",
                connector_id = %sink.connector_id,
                devices,
                values,
                "forward_batch_dropped"
            );
            ForwardOutcome::Failed { devices, values }
        };
        self.tracker.refresh_gateway(&sink.gateway_id).await;
        outcome
    }

    async fn deliver(&self, sink: &ConnectorRecord, payload: &Value) -> bool {
        let result = match self.sink_for(sink) {
            Ok(target) => target.deliver(payload).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                gw_telemetry::record_forward_success();
                self.tracker
                    .connection_state(&sink.connector_id, true)
                    .await;
                debug!(
                    target: "gw.forward",
                    connector_id = %sink.connector_id,
                    kind = sink.kind().as_str(),
                    "forward_push_ok"
                );
                true
            }
            Err(err) => {
                gw_telemetry::record_forward_failure();
                self.tracker
                    .connection_state(&sink.connector_id, false)
                    .await;
                warn!(
                    target: "gw.forward",
                    connector_id = %sink.connector_id,
                    kind = sink.kind().as_str(),
                    error = %err,
                    "forward_push_failed"
                );
                false
            }
        }
    }

    /// 重新读取出站连接器并登记缓存来源，返回连接器与下次转发前的等待时间。
    ///
    /// 等待时间取同网关入站连接器的最小间隔；连接器已删除时返回 `None`。
    pub async fn prepare_lane(
        &self,
        sink_id: &str,
    ) -> Result<Option<(ConnectorRecord, Duration)>, ForwardError> {
        let Some(sink) = self
            .store
            .find_connector(sink_id)
            .await
            .map_err(|err| ForwardError::Configuration(err.to_string()))?
        else {
            return Ok(None);
        };
        let inbound: Vec<ConnectorRecord> = self
            .store
            .list_gateway_connectors(&sink.gateway_id)
            .await
            .map_err(|err| ForwardError::Configuration(err.to_string()))?
            .into_iter()
            .filter(|item| item.is_inbound())
            .collect();
        let interval = inbound
            .iter()
            .map(|item| item.interval_secs())
            .min()
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        self.cache
            .subscribe(
                &sink.connector_id,
                inbound.into_iter().map(|item| item.connector_id),
            )
            .await;
        Ok(Some((sink, Duration::from_secs(interval))))
    }
}

/// 启动出站连接器的转发任务；停止信号只在两次转发之间生效。
///
/// 停止时保留缓存通道，重启后未转发的数据在下一次转发送出；
/// 只有连接器被删除时才移除通道。
pub fn spawn_forwarder(
    forwarder: Forwarder,
    sink_id: String,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(target: "gw.forward", connector_id = %sink_id, "forwarder_start");
        let mut removed = false;
        loop {
            let wait = match forwarder.prepare_lane(&sink_id).await {
                Ok(Some((_, wait))) => wait,
                Ok(None) => {
                    removed = true;
                    break;
                }
                Err(err) => {
                    warn!(
                        target: "gw.forward",
                        connector_id = %sink_id,
                        error = %err,
                        "forwarder_config_read_failed"
                    );
                    Duration::from_secs(DEFAULT_INTERVAL_SECS)
                }
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }
            match forwarder.store.find_connector(&sink_id).await {
                Ok(Some(sink)) => {
                    forwarder.forward_once(&sink).await;
                }
                Ok(None) => {
                    removed = true;
                    break;
                }
                Err(err) => {
                    warn!(
                        target: "gw.forward",
                        connector_id = %sink_id,
                        error = %err,
                        "forwarder_config_read_failed"
                    );
                }
            }
        }
        if removed {
            forwarder.cache.unsubscribe(&sink_id).await;
            info!(target: "gw.forward", connector_id = %sink_id, "forwarder_sink_removed");
        }
        info!(target: "gw.forward", connector_id = %sink_id, "forwarder_stopped");
    })
}
