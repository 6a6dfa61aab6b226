//! HTTP 响应辅助函数和 DTO 转换
//!
//! 所有错误返回统一的 ApiResponse 格式。

use api_contract::{ApiResponse, ConnectorDto, DeviceDto, GatewayDto, LatestSampleDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{ConnectorRecord, DeviceRecord, GatewayRecord, SampleRecord};
use gw_storage::StorageError;

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found")),
    )
        .into_response()
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    let message = err.to_string();
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", message)),
    )
        .into_response()
}

pub fn gateway_to_dto(record: GatewayRecord) -> GatewayDto {
    GatewayDto {
        gateway_id: record.gateway_id,
        name: record.name,
        status: record.status.as_str().to_string(),
    }
}

pub fn connector_to_dto(record: ConnectorRecord) -> ConnectorDto {
    ConnectorDto {
        interval_secs: record.interval_secs(),
        max_retained_samples: record.max_samples(),
        direction: record.direction.as_str().to_string(),
        kind: record.kind().as_str().to_string(),
        status: record.status.as_str().to_string(),
        connector_id: record.connector_id,
        gateway_id: record.gateway_id,
        name: record.name,
    }
}

pub fn device_to_dto(record: DeviceRecord) -> DeviceDto {
    DeviceDto {
        address: format!("{}:{}", record.host, record.port),
        status: record.status.as_str().to_string(),
        device_id: record.device_id,
        connector_id: record.connector_id,
        name: record.name,
    }
}

pub fn sample_to_dto(record: SampleRecord) -> LatestSampleDto {
    LatestSampleDto {
        series_id: record.series_id,
        key: record.key,
        value: record.value,
        ts_ms: record.ts_ms,
    }
}
