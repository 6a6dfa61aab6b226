//! 指标快照
//!
//! - GET /api/metrics

use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gw_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            poll_cycles: snapshot.poll_cycles,
            connectors_polled: snapshot.connectors_polled,
            device_connect_failures: snapshot.device_connect_failures,
            register_read_failures: snapshot.register_read_failures,
            samples_written: snapshot.samples_written,
            samples_pruned: snapshot.samples_pruned,
            bus_messages: snapshot.bus_messages,
            bus_dropped_unmatched: snapshot.bus_dropped_unmatched,
            bus_dropped_undeclared: snapshot.bus_dropped_undeclared,
            bus_keys_rejected: snapshot.bus_keys_rejected,
            decode_failures: snapshot.decode_failures,
            forward_success: snapshot.forward_success,
            forward_failure: snapshot.forward_failure,
            bus_reconnects: snapshot.bus_reconnects,
        })),
    )
        .into_response()
}
