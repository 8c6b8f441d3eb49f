//! Server listing and cached stats endpoints

use axum::{
    Json,
    extract::{Path, State},
};

use crate::ServerId;
use crate::api::error::ApiResult;
use crate::api::state::ApiState;
use crate::api::types::{ServerInfo, ServersResponse, StatsResponse};

/// GET /api/v1/servers
///
/// All registered servers with their probed status, newest first
pub async fn list_servers(State(state): State<ApiState>) -> ApiResult<Json<ServersResponse>> {
    let servers: Vec<ServerInfo> = state
        .engine
        .list_servers()
        .await?
        .into_iter()
        .map(ServerInfo::from)
        .collect();

    Ok(Json(ServersResponse {
        count: servers.len(),
        servers,
    }))
}

/// GET /api/v1/servers/:id/stats
///
/// Last cached stats. Fields read `"unknown"` when nothing is cached or the
/// entry expired.
pub async fn get_server_stats(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StatsResponse>> {
    let id = ServerId(id);
    let status = state.engine.server_status(id).await?;
    let stats = state.engine.cached_stats(id).await?;

    Ok(Json(StatsResponse::new(id, status, stats)))
}
