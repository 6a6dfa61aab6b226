use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};

/// 健康检查，附带引擎运行状态与存活的数据面任务数
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let running = state.orchestrator.is_running().await;
    let active_loops = state.orchestrator.active_loops().await;
    Json(serde_json::json!({
        "ok": true,
        "engineRunning": running,
        "activeLoops": active_loops,
    }))
}
