//! 网关监控 handlers
//!
//! - GET /api/gateways - 网关及状态
//! - GET /api/gateways/{gid}/connectors - 网关下的连接器
//! - GET /api/gateways/{gid}/devices - 网关下的寄存器轮询设备

use crate::AppState;
use crate::utils::response::{
    connector_to_dto, device_to_dto, gateway_to_dto, not_found_error, storage_error,
};
use api_contract::{ApiResponse, ConnectorDto, DeviceDto, GatewayDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(serde::Deserialize)]
pub struct GatewayPath {
    gateway_id: String,
}

pub async fn list_gateways(State(state): State<AppState>) -> Response {
    match state.config_store.list_gateways().await {
        Ok(items) => {
            let data: Vec<GatewayDto> = items.into_iter().map(gateway_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn list_gateway_connectors(
    State(state): State<AppState>,
    Path(path): Path<GatewayPath>,
) -> Response {
    match state.config_store.find_gateway(&path.gateway_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    match state
        .config_store
        .list_gateway_connectors(&path.gateway_id)
        .await
    {
        Ok(items) => {
            let data: Vec<ConnectorDto> = items.into_iter().map(connector_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}

pub async fn list_gateway_devices(
    State(state): State<AppState>,
    Path(path): Path<GatewayPath>,
) -> Response {
    match state.config_store.find_gateway(&path.gateway_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_error(),
        Err(err) => return storage_error(err),
    }
    let connectors = match state
        .config_store
        .list_gateway_connectors(&path.gateway_id)
        .await
    {
        Ok(items) => items,
        Err(err) => return storage_error(err),
    };
    let mut data: Vec<DeviceDto> = Vec::new();
    for connector in connectors.iter().filter(|item| item.is_inbound()) {
        match state.config_store.list_devices(&connector.connector_id).await {
            Ok(items) => data.extend(items.into_iter().map(device_to_dto)),
            Err(err) => return storage_error(err),
        }
    }
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}
