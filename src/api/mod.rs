//! Control and read API for the CRUD collaborators
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/servers` - Registered servers with their probed status
//! - `GET /api/v1/servers/:id/stats` - Cached stats of one server
//! - `POST /api/v1/servers/:id/monitoring` - Start polling a server
//! - `DELETE /api/v1/servers/:id/monitoring` - Stop polling a server

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiSettings;

/// Build the router. Requests must carry `auth_token` as bearer token when
/// one is given. The health check is always open.
pub fn router(state: ApiState, auth_token: Option<String>, enable_cors: bool) -> Router {
    let mut protected = Router::new()
        .route("/api/v1/servers", get(routes::servers::list_servers))
        .route(
            "/api/v1/servers/:id/stats",
            get(routes::servers::get_server_stats),
        )
        .route(
            "/api/v1/servers/:id/monitoring",
            post(routes::monitoring::start_monitoring)
                .delete(routes::monitoring::stop_monitoring),
        )
        .with_state(state);

    if let Some(token) = auth_token {
        protected = protected.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Start the API server in a background task and return its local address.
pub async fn spawn_api_server(
    settings: &ApiSettings,
    auth_token: Option<String>,
    state: ApiState,
) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", settings.bind_addr);

    if auth_token.is_none() {
        info!("no API token configured, the API is unauthenticated");
    }

    let app = router(state, auth_token, settings.enable_cors);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("cannot bind API server to {}", settings.bind_addr))?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
