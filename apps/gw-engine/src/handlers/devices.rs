//! 设备最新样本
//!
//! - GET /api/devices/{did}/latest - 设备下每个序列的最新值

use crate::AppState;
use crate::utils::response::{sample_to_dto, storage_error};
use api_contract::{ApiResponse, LatestSampleDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(serde::Deserialize)]
pub struct DevicePath {
    device_id: String,
}

pub async fn latest_samples(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
) -> Response {
    match state.sample_store.latest_by_device(&path.device_id).await {
        Ok(items) => {
            let data: Vec<LatestSampleDto> = items.into_iter().map(sample_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => storage_error(err),
    }
}
