//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::endpoints::with_db;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub conflict_policy: String,
    pub version: &'static str,
}

/// `GET /api/health`: unauthenticated liveness and database check.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = with_db(&ctx, |_, conn| {
        Ok(crate::db::count_tables(conn).map(|n| n > 0).unwrap_or(false))
    })
    .await
    .unwrap_or(false);

    Ok(Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
        conflict_policy: ctx.core.scheduler.policy().to_string(),
        version: crate::config::APP_VERSION,
    }))
}
