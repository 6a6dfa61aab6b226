//! 状态跟踪（设备 → 连接器 → 网关）
//!
//! 聚合规则在 `domain::status` 中，这里负责把每次评估结果写回配置存储。
//! 写回失败只记录日志，不向调用方传播：状态是观测结果，不能打断轮询或转发循环。

use domain::{Status, connector_status, gateway_status};
use gw_storage::ConfigStore;
use std::sync::Arc;
use tracing::warn;

/// 状态跟踪器
#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn ConfigStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    /// 记录设备最近一次连接结果。
    pub async fn device_outcome(&self, device_id: &str, connected: bool) -> Status {
        let status = Status::from_active(connected);
        if let Err(err) = self.store.set_device_status(device_id, status).await {
            warn!(
                target: "gw.status",
                device_id,
                status = status.as_str(),
                error = %err,
                "device_status_write_failed"
            );
        }
        status
    }

    /// 入站周期结束：连接器状态 = 至少一个设备 active。
    pub async fn connector_cycle(&self, connector_id: &str, devices: &[Status]) -> Status {
        let status = connector_status(devices);
        self.write_connector(connector_id, status).await;
        status
    }

    /// 总线/HTTP 连接状态（当前连接可用即 active）。
    pub async fn connection_state(&self, connector_id: &str, open: bool) -> Status {
        let status = Status::from_active(open);
        self.write_connector(connector_id, status).await;
        status
    }

    /// 重新计算网关状态：任一入站或出站连接器 active。
    pub async fn refresh_gateway(&self, gateway_id: &str) -> Option<Status> {
        let connectors = match self.store.list_gateway_connectors(gateway_id).await {
            Ok(items) => items,
            Err(err) => {
                warn!(target: "gw.status", gateway_id, error = %err, "gateway_status_read_failed");
                return None;
            }
        };
        let (inbound, outbound): (Vec<_>, Vec<_>) =
            connectors.iter().partition(|item| item.is_inbound());
        let inbound: Vec<Status> = inbound.iter().map(|item| item.status).collect();
        let outbound: Vec<Status> = outbound.iter().map(|item| item.status).collect();
        let status = gateway_status(&inbound, &outbound);
        if let Err(err) = self.store.set_gateway_status(gateway_id, status).await {
            warn!(
                target: "gw.status",
                gateway_id,
                status = status.as_str(),
                error = %err,
                "gateway_status_write_failed"
            );
        }
        Some(status)
    }

    async fn write_connector(&self, connector_id: &str, status: Status) {
        if let Err(err) = self.store.set_connector_status(connector_id, status).await {
            warn!(
                target: "gw.status",
                connector_id,
                status = status.as_str(),
                error = %err,
                "connector_status_write_failed"
            );
        }
    }
}
