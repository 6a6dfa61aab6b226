//! 源轮询
//!
//! 单一调度 tick 驱动：每个 tick 重新读取寄存器轮询连接器，
//! 按到期表挑出到期的连接器，逐台设备建立会话、逐个序列读取。
//! 单台设备或单个序列失败只影响自身。

use crate::error::PollError;
use crate::schedule::DueTable;
use domain::{
    ConnectorKind, ConnectorRecord, DeviceRecord, DeviceValues, SampleRecord, Status,
    now_epoch_ms,
};
use gw_forward::{DevicePush, Forwarder};
use gw_protocol::{RegisterEndpoint, RegisterReader, RegisterSession, decode};
use gw_status::StatusTracker;
use gw_storage::{ConfigStore, RetentionScope, SampleStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 一个周期的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// 参与调度的寄存器轮询连接器
    pub connectors: usize,
    /// 本周期到期并执行的连接器
    pub polled: usize,
}

/// 一个连接器一次轮询的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorReport {
    pub devices: usize,
    pub active_devices: usize,
    pub samples: usize,
    /// 连接器状态；没有设备时为 `None`（不更新）
    pub status: Option<Status>,
}

/// 源轮询器
pub struct SourcePoller {
    store: Arc<dyn ConfigStore>,
    samples: Arc<dyn SampleStore>,
    reader: Arc<dyn RegisterReader>,
    tracker: StatusTracker,
    forwarder: Forwarder,
    due: DueTable,
}

impl SourcePoller {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        samples: Arc<dyn SampleStore>,
        reader: Arc<dyn RegisterReader>,
        tracker: StatusTracker,
        forwarder: Forwarder,
    ) -> Self {
        Self {
            store,
            samples,
            reader,
            tracker,
            forwarder,
            due: DueTable::new(),
        }
    }

    pub fn due_table(&self) -> &DueTable {
        &self.due
    }

    /// 执行一个调度周期。`now_ms` 只用于到期判断。
    pub async fn run_cycle(&mut self, now_ms: i64) -> Result<CycleReport, PollError> {
        gw_telemetry::record_poll_cycle();
        let connectors: Vec<ConnectorRecord> = self
            .store
            .list_connectors()
            .await?
            .into_iter()
            .filter(|item| item.is_inbound() && item.kind() == ConnectorKind::RegisterPoll)
            .collect();
        let live: HashSet<String> = connectors
            .iter()
            .map(|item| item.connector_id.clone())
            .collect();
        self.due.retain(&live);

        let mut report = CycleReport {
            connectors: connectors.len(),
            polled: 0,
        };
        for connector in &connectors {
            if !self.due.is_due(&connector.connector_id, now_ms) {
                continue;
            }
            self.due
                .mark_run(&connector.connector_id, now_ms, connector.interval_secs());
            gw_telemetry::record_connector_polled();
            report.polled += 1;
            match self.poll_connector(connector).await {
                Ok(result) => debug!(
                    target: "gw.poller",
                    connector_id = %connector.connector_id,
                    devices = result.devices,
                    active_devices = result.active_devices,
                    samples = result.samples,
                    "connector_polled"
                ),
                Err(err) => warn!(
                    target: "gw.poller",
                    connector_id = %connector.connector_id,
                    error = %err,
                    "connector_poll_failed"
                ),
            }
        }
        Ok(report)
    }

    /// 轮询一个连接器下的全部设备。
    pub async fn poll_connector(
        &self,
        connector: &ConnectorRecord,
    ) -> Result<ConnectorReport, PollError> {
        let devices = self.store.list_devices(&connector.connector_id).await?;
        if devices.is_empty() {
            return Ok(ConnectorReport::default());
        }
        let gateway_name = self
            .store
            .find_gateway(&connector.gateway_id)
            .await?
            .map(|item| item.name)
            .unwrap_or_else(|| connector.gateway_id.clone());
        let sinks: Vec<ConnectorRecord> = self
            .store
            .list_gateway_connectors(&connector.gateway_id)
            .await?
            .into_iter()
            .filter(|item| !item.is_inbound())
            .collect();
        let scope = RetentionScope::Connector(connector.connector_id.clone());
        let max_samples = connector.max_samples();

        let mut report = ConnectorReport {
            devices: devices.len(),
            ..Default::default()
        };
        let mut outcomes = Vec::with_capacity(devices.len());
        for device in &devices {
            let endpoint = RegisterEndpoint::from(device);
            let mut session = match self.reader.connect(&endpoint).await {
                Ok(session) => session,
                Err(err) => {
                    gw_telemetry::record_device_connect_failure();
                    warn!(
                        target: "gw.poller",
                        connector_id = %connector.connector_id,
                        device_id = %device.device_id,
                        endpoint = %endpoint,
                        error = %err,
                        "device_connect_failed"
                    );
                    outcomes.push(self.tracker.device_outcome(&device.device_id, false).await);
                    continue;
                }
            };
            outcomes.push(self.tracker.device_outcome(&device.device_id, true).await);
            report.active_devices += 1;

            let values = self
                .read_device(device, session.as_mut(), &scope, max_samples)
                .await;
            drop(session);
            report.samples += values.len();
            if values.is_empty() || sinks.is_empty() {
                continue;
            }
            let push = DevicePush {
                gateway_name: &gateway_name,
                source_connector_id: &connector.connector_id,
                device_name: &device.name,
                values: &values,
                timestamp: now_epoch_ms(),
            };
            self.forwarder.push_device(&sinks, &push).await;
        }

        report.status = Some(
            self.tracker
                .connector_cycle(&connector.connector_id, &outcomes)
                .await,
        );
        self.tracker.refresh_gateway(&connector.gateway_id).await;
        Ok(report)
    }

    /// 读取一台设备的全部序列，返回 序列名 → 缩放后的值。
    async fn read_device(
        &self,
        device: &DeviceRecord,
        session: &mut dyn RegisterSession,
        scope: &RetentionScope,
        max_samples: i64,
    ) -> DeviceValues {
        let mut values = DeviceValues::new();
        let series = match self.store.list_series(&device.device_id).await {
            Ok(items) => items,
            Err(err) => {
                warn!(
                    target: "gw.poller",
                    device_id = %device.device_id,
                    error = %err,
                    "series_read_failed"
                );
                return values;
            }
        };
        for item in &series {
            let Some(address) = item.start_address() else {
                warn!(
                    target: "gw.poller",
                    series_id = %item.series_id,
                    "series_without_address"
                );
                continue;
            };
            let registers = match session.read_holding(address, item.register_count()).await {
                Ok(registers) => registers,
                Err(err) => {
                    gw_telemetry::record_register_read_failure();
                    warn!(
                        target: "gw.poller",
                        device_id = %device.device_id,
                        series_id = %item.series_id,
                        address,
                        error = %err,
                        "register_read_failed"
                    );
                    continue;
                }
            };
            let raw = match decode(&registers, item.data_type, &item.byte_order) {
                Ok(raw) => raw,
                Err(err) => {
                    gw_telemetry::record_decode_failure();
                    warn!(
                        target: "gw.poller",
                        series_id = %item.series_id,
                        data_type = item.data_type.as_str(),
                        byte_order = item.byte_order.letters(),
                        error = %err,
                        "register_decode_failed"
                    );
                    continue;
                }
            };
            let value = raw * item.scale;
            let sample = SampleRecord {
                series_id: item.series_id.clone(),
                device_id: device.device_id.clone(),
                key: item.name.clone(),
                value,
                ts_ms: now_epoch_ms(),
            };
            match self.samples.append(&sample, scope, max_samples).await {
                Ok(pruned) => {
                    gw_telemetry::record_sample_written();
                    gw_telemetry::record_samples_pruned(pruned);
                }
                Err(err) => warn!(
                    target: "gw.poller",
                    series_id = %item.series_id,
                    error = %err,
                    "sample_write_failed"
                ),
            }
            values.insert(item.name.clone(), value);
        }
        values
    }
}

/// 启动轮询循环；停止信号在两个周期之间生效。
pub fn spawn_poller(
    mut poller: SourcePoller,
    tick: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(target: "gw.poller", tick_ms = tick.as_millis() as u64, "poller_start");
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            if let Err(err) = poller.run_cycle(now_epoch_ms()).await {
                warn!(target: "gw.poller", error = %err, "poll_cycle_failed");
            }
        }
        info!(target: "gw.poller", "poller_stopped");
    })
}
