//! 路由定义
//!
//! - 健康检查：/health
//! - 监控接口：/api/gateways/*, /api/devices/*, /api/metrics

use super::AppState;
use super::handlers::*;
use super::middleware::request_context;
use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

/// 创建监控 API 路由
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/gateways", get(list_gateways))
        .route(
            "/api/gateways/:gateway_id/connectors",
            get(list_gateway_connectors),
        )
        .route("/api/gateways/:gateway_id/devices", get(list_gateway_devices))
        .route("/api/devices/:device_id/latest", get(latest_samples))
        .route("/api/metrics", get(get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_context))
}
