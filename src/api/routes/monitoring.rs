//! Start and stop triggers for the polling loop

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::debug;

use crate::ServerId;
use crate::api::error::ApiResult;
use crate::api::state::ApiState;
use crate::api::types::MonitoringResponse;

/// POST /api/v1/servers/:id/monitoring
///
/// Start polling. Repeating the call replaces the running loop.
pub async fn start_monitoring(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MonitoringResponse>> {
    let id = ServerId(id);
    let token = state.engine.start_polling(id).await?;
    debug!("server {id} monitored under token {token}");

    Ok(Json(MonitoringResponse {
        server_id: id,
        monitoring: true,
        token: Some(token),
    }))
}

/// DELETE /api/v1/servers/:id/monitoring
///
/// Stop polling. Stopping an unmonitored server succeeds.
pub async fn stop_monitoring(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MonitoringResponse>> {
    let id = ServerId(id);
    state.engine.stop_polling(id).await?;

    Ok(Json(MonitoringResponse {
        server_id: id,
        monitoring: false,
        token: None,
    }))
}
