//! Triage endpoints.
//!
//! - `POST /api/triage`: classify and record symptoms
//! - `GET  /api/triage?pet_id=&risk=`: triage history, optionally one tier
//!
//! Responses carry the tier's labels (`risk_label`, `risk_notice_label`)
//! and legacy code (`risk_code`) next to `risk_level`. The `risk` filter
//! accepts any of those spellings.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::endpoints::with_db;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::models::enums::RiskLevel;
use crate::models::TriageView;
use crate::triage;

#[derive(Debug, Deserialize)]
pub struct TriageRequest {
    #[serde(default)]
    pub pet_id: String,
    #[serde(default)]
    pub symptoms: String,
}

#[derive(Debug, Deserialize)]
pub struct TriageQuery {
    pub pet_id: Option<String>,
    pub risk: Option<String>,
}

#[derive(Serialize)]
pub struct TriageHistoryResponse {
    pub results: Vec<TriageView>,
}

fn risk_filter(raw: Option<&str>) -> Result<Option<RiskLevel>, ApiError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => RiskLevel::parse_any(r)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown risk level '{r}'"))),
    }
}

/// `POST /api/triage`: 201 with the stored result.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    payload: Result<Json<TriageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TriageView>), ApiError> {
    let Json(req) = payload?;
    let result = with_db(&ctx, move |core, conn| {
        Ok(triage::submit_triage(
            conn,
            core.classifier(),
            core.notifier(),
            &caller,
            &req.pet_id,
            &req.symptoms,
        )?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(result.into())))
}

/// `GET /api/triage`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    query: Result<Query<TriageQuery>, QueryRejection>,
) -> Result<Json<TriageHistoryResponse>, ApiError> {
    let Query(query) = query?;
    let risk = risk_filter(query.risk.as_deref())?;
    let results = with_db(&ctx, move |_, conn| {
        Ok(triage::list_triage(conn, &caller, query.pet_id.as_deref())?)
    })
    .await?;
    let results = results
        .into_iter()
        .filter(|r| risk.map_or(true, |level| r.risk_level == level))
        .map(TriageView::from)
        .collect();
    Ok(Json(TriageHistoryResponse { results }))
}
