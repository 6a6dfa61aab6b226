//! 配置内存存储实现
//!
//! 用于测试与无数据库运行（由拓扑文件填充）。

use crate::error::StorageError;
use crate::traits::ConfigStore;
use domain::{ConnectorRecord, DeviceRecord, GatewayRecord, SeriesRecord, Status};
use std::sync::RwLock;

#[derive(Default)]
struct ConfigState {
    gateways: Vec<GatewayRecord>,
    connectors: Vec<ConnectorRecord>,
    devices: Vec<DeviceRecord>,
    series: Vec<SeriesRecord>,
}

/// 配置内存存储
///
/// 使用 RwLock + Vec 保持声明顺序。
#[derive(Default)]
pub struct InMemoryConfigStore {
    state: RwLock<ConfigState>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换一个网关的完整定义（连接器、设备、序列一并替换）。
    pub fn replace_gateway(
        &self,
        gateway: GatewayRecord,
        connectors: Vec<ConnectorRecord>,
        devices: Vec<DeviceRecord>,
        series: Vec<SeriesRecord>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::lock_failed())?;
        let gateway_id = gateway.gateway_id.clone();
        let stale: Vec<String> = state
            .connectors
            .iter()
            .filter(|item| item.gateway_id == gateway_id)
            .map(|item| item.connector_id.clone())
            .collect();
        remove_connectors(&mut state, &stale);
        state.gateways.retain(|item| item.gateway_id != gateway_id);

        state.gateways.push(gateway);
        state.connectors.extend(connectors);
        state.devices.extend(devices);
        state.series.extend(series);
        Ok(())
    }

    /// 新增或替换单个连接器（保持原位置）。
    pub fn upsert_connector(&self, record: ConnectorRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::lock_failed())?;
        match state
            .connectors
            .iter_mut()
            .find(|item| item.connector_id == record.connector_id)
        {
            Some(existing) => *existing = record,
            None => state.connectors.push(record),
        }
        Ok(())
    }

    /// 删除连接器及其设备、序列。
    pub fn remove_connector(&self, connector_id: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::lock_failed())?;
        let existed = state
            .connectors
            .iter()
            .any(|item| item.connector_id == connector_id);
        remove_connectors(&mut state, &[connector_id.to_string()]);
        Ok(existed)
    }
}

fn remove_connectors(state: &mut ConfigState, connector_ids: &[String]) {
    if connector_ids.is_empty() {
        return;
    }
    let device_ids: Vec<String> = state
        .devices
        .iter()
        .filter(|item| connector_ids.contains(&item.connector_id))
        .map(|item| item.device_id.clone())
        .collect();
    state
        .series
        .retain(|item| !device_ids.contains(&item.device_id));
    state
        .devices
        .retain(|item| !connector_ids.contains(&item.connector_id));
    state
        .connectors
        .retain(|item| !connector_ids.contains(&item.connector_id));
}

#[async_trait::async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn list_gateways(&self) -> Result<Vec<GatewayRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        Ok(state.gateways.clone())
    }

    async fn find_gateway(&self, gateway_id: &str) -> Result<Option<GatewayRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        Ok(state
            .gateways
            .iter()
            .find(|item| item.gateway_id == gateway_id)
            .cloned())
    }

    async fn list_connectors(&self) -> Result<Vec<ConnectorRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        Ok(state.connectors.clone())
    }

    async fn list_gateway_connectors(
        &self,
        gateway_id: &str,
    ) -> Result<Vec<ConnectorRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        Ok(state
            .connectors
            .iter()
            .filter(|item| item.gateway_id == gateway_id)
            .cloned()
            .collect())
    }

    async fn find_connector(
        &self,
        connector_id: &str,
    ) -> Result<Option<ConnectorRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        Ok(state
            .connectors
            .iter()
            .find(|item| item.connector_id == connector_id)
            .cloned())
    }

    async fn list_devices(&self, connector_id: &str) -> Result<Vec<DeviceRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        Ok(state
            .devices
            .iter()
            .filter(|item| item.connector_id == connector_id)
            .cloned()
            .collect())
    }

    async fn list_series(&self, device_id: &str) -> Result<Vec<SeriesRecord>, StorageError> {
        let state = self.state.read().map_err(|_| StorageError::lock_failed())?;
        Ok(state
            .series
            .iter()
            .filter(|item| item.device_id == device_id)
            .cloned()
            .collect())
    }

    async fn set_gateway_status(
        &self,
        gateway_id: &str,
        status: Status,
    ) -> Result<bool, StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::lock_failed())?;
        let Some(item) = state
            .gateways
            .iter_mut()
            .find(|item| item.gateway_id == gateway_id)
        else {
            return Ok(false);
        };
        item.status = status;
        Ok(true)
    }

    async fn set_connector_status(
        &self,
        connector_id: &str,
        status: Status,
    ) -> Result<bool, StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::lock_failed())?;
        let Some(item) = state
            .connectors
            .iter_mut()
            .find(|item| item.connector_id == connector_id)
        else {
            return Ok(false);
        };
        item.status = status;
        Ok(true)
    }

    async fn set_device_status(
        &self,
        device_id: &str,
        status: Status,
    ) -> Result<bool, StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::lock_failed())?;
        let Some(item) = state
            .devices
            .iter_mut()
            .find(|item| item.device_id == device_id)
        else {
            return Ok(false);
        };
        item.status = status;
        Ok(true)
    }
}
