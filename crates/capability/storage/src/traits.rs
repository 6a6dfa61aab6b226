//! 存储接口 Trait 定义
//!
//! - ConfigStore：配置快照读取 + 状态字段写回
//! - SampleStore：有界样本保留（写入即裁剪）
//!
//! 设计原则：
//! - 数据面只修改 `status` 字段与追加样本，不修改实体标识
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{ConnectorRecord, DeviceRecord, GatewayRecord, SampleRecord, SeriesRecord, Status};

/// 配置存储接口
///
/// 每个调度周期重新读取，配置修改在一个周期内生效。
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// 列出所有网关
    async fn list_gateways(&self) -> Result<Vec<GatewayRecord>, StorageError>;

    /// 查找指定网关
    async fn find_gateway(&self, gateway_id: &str) -> Result<Option<GatewayRecord>, StorageError>;

    /// 列出所有连接器（声明顺序）
    async fn list_connectors(&self) -> Result<Vec<ConnectorRecord>, StorageError>;

    /// 列出指定网关下的连接器
    async fn list_gateway_connectors(
        &self,
        gateway_id: &str,
    ) -> Result<Vec<ConnectorRecord>, StorageError>;

    /// 查找指定连接器
    async fn find_connector(
        &self,
        connector_id: &str,
    ) -> Result<Option<ConnectorRecord>, StorageError>;

    /// 列出寄存器轮询连接器下的设备
    async fn list_devices(&self, connector_id: &str) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 列出设备下的序列
    async fn list_series(&self, device_id: &str) -> Result<Vec<SeriesRecord>, StorageError>;

    /// 写回网关状态；记录不存在返回 false
    async fn set_gateway_status(
        &self,
        gateway_id: &str,
        status: Status,
    ) -> Result<bool, StorageError>;

    /// 写回连接器状态
    async fn set_connector_status(
        &self,
        connector_id: &str,
        status: Status,
    ) -> Result<bool, StorageError>;

    /// 写回设备状态
    async fn set_device_status(
        &self,
        device_id: &str,
        status: Status,
    ) -> Result<bool, StorageError>;
}

/// 保留范围：共享同一条数上限的样本集合
///
/// - 寄存器轮询：同一入站连接器下所有序列共享一个上限
/// - 总线：同一设备的所有样本共享一个上限
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RetentionScope {
    Connector(String),
    Device(String),
}

impl RetentionScope {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connector(_) => "connector",
            Self::Device(_) => "device",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Connector(id) | Self::Device(id) => id,
        }
    }
}

/// 样本存储接口（Retention Store）
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// 追加样本并在同一操作内裁剪超出 `max_samples` 的最旧样本。
    ///
    /// 排序为时间戳降序（同时间戳按写入先后）；`max_samples <= 0` 不裁剪。
    /// 返回本次删除的样本数。
    async fn append(
        &self,
        sample: &SampleRecord,
        scope: &RetentionScope,
        max_samples: i64,
    ) -> Result<u64, StorageError>;

    /// 列出保留范围内的样本（最新在前），`limit <= 0` 表示全部
    async fn list_samples(
        &self,
        scope: &RetentionScope,
        limit: i64,
    ) -> Result<Vec<SampleRecord>, StorageError>;

    /// 设备下每个 key 的最新样本
    async fn latest_by_device(&self, device_id: &str) -> Result<Vec<SampleRecord>, StorageError>;
}
