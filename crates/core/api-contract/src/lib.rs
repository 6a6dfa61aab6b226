//! 稳定的 DTO 与 API 响应契约（只读监控 API）。

use serde::Serialize;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 网关 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDto {
    pub gateway_id: String,
    pub name: String,
    pub status: String,
}

/// 连接器 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDto {
    pub connector_id: String,
    pub gateway_id: String,
    pub name: String,
    pub direction: String,
    pub kind: String,
    pub interval_secs: u64,
    pub max_retained_samples: i64,
    pub status: String,
}

/// 设备 DTO（寄存器轮询设备）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub device_id: String,
    pub connector_id: String,
    pub name: String,
    pub address: String,
    pub status: String,
}

/// 每个序列的最新样本。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestSampleDto {
    pub series_id: String,
    pub key: String,
    pub value: f64,
    pub ts_ms: i64,
}

/// 指标快照 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub poll_cycles: u64,
    pub connectors_polled: u64,
    pub device_connect_failures: u64,
    pub register_read_failures: u64,
    pub samples_written: u64,
    pub samples_pruned: u64,
    pub bus_messages: u64,
    pub bus_dropped_unmatched: u64,
    pub bus_dropped_undeclared: u64,
    pub bus_keys_rejected: u64,
    pub decode_failures: u64,
    pub forward_success: u64,
    pub forward_failure: u64,
    pub bus_reconnects: u64,
}
