//! HTTP handlers for health endpoints.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::health::{DbHealthResponse, HealthResponse},
    db,
};

#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    summary = "Liveness",
    description = "Returns 200 while the service is up",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[utoipa::path(
    get,
    path = "/db/health",
    tag = "health",
    summary = "Database health",
    description = "Reports the configured provider and whether the database can be reached. Always 200; check `connected`.",
    responses(
        (status = 200, description = "Database status", body = DbHealthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn db_health(State(state): State<AppState>) -> Json<DbHealthResponse> {
    Json(DbHealthResponse {
        provider: state.config.database.provider.clone(),
        connected: db::can_connect(&state.db).await,
    })
}
