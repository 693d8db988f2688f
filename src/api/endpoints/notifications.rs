//! Notification endpoints.
//!
//! - `GET   /api/notifications`: caller's inbox with unread count
//! - `PATCH /api/notifications/:id/read`
//! - `PATCH /api/notifications/read-all`

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::endpoints::with_db;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::notify::{self, Inbox};

#[derive(Serialize)]
pub struct MarkedResponse {
    pub updated: usize,
}

/// `GET /api/notifications`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<Inbox>, ApiError> {
    let inbox = with_db(&ctx, move |_, conn| Ok(notify::list_inbox(conn, &caller)?)).await?;
    Ok(Json(inbox))
}

/// `PATCH /api/notifications/:id/read`
pub async fn mark_read(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<MarkedResponse>, ApiError> {
    with_db(&ctx, move |_, conn| Ok(notify::mark_read(conn, &id, &caller)?)).await?;
    Ok(Json(MarkedResponse { updated: 1 }))
}

/// `PATCH /api/notifications/read-all`
pub async fn mark_all_read(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<MarkedResponse>, ApiError> {
    let updated =
        with_db(&ctx, move |_, conn| Ok(notify::mark_all_read(conn, &caller)?)).await?;
    Ok(Json(MarkedResponse { updated }))
}
