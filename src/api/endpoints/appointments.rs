//! Appointment endpoints.
//!
//! - `POST  /api/appointments`: book
//! - `GET   /api/appointments`: caller-scoped list
//! - `GET   /api/appointments/:id`: one appointment
//! - `PATCH /api/appointments/:id/confirm`: assigned vet confirms
//! - `PATCH /api/appointments/:id/cancel`: tutor cancels
//! - `PATCH /api/appointments/:id/complete`: assigned vet records the consultation

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::endpoints::with_db;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::models::{AppointmentView, Consultation};
use crate::scheduler::{BookingRequest, ConsultationInput};

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<AppointmentView>,
}

/// `POST /api/appointments`: 201 with the new appointment.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AppointmentView>), ApiError> {
    let Json(req) = payload?;
    let view = with_db(&ctx, move |core, conn| {
        Ok(core.scheduler.book_appointment(conn, &caller, &req)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/appointments`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let appointments = with_db(&ctx, move |core, conn| {
        Ok(core.scheduler.list_appointments(conn, &caller)?)
    })
    .await?;
    Ok(Json(AppointmentsResponse { appointments }))
}

/// `GET /api/appointments/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentView>, ApiError> {
    let view = with_db(&ctx, move |core, conn| {
        Ok(core.scheduler.get_appointment(conn, &caller, &id)?)
    })
    .await?;
    Ok(Json(view))
}

/// `PATCH /api/appointments/:id/confirm`
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentView>, ApiError> {
    let view = with_db(&ctx, move |core, conn| {
        Ok(core.scheduler.confirm_appointment(conn, &caller, &id)?)
    })
    .await?;
    Ok(Json(view))
}

/// `PATCH /api/appointments/:id/cancel`
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentView>, ApiError> {
    let view = with_db(&ctx, move |core, conn| {
        Ok(core.scheduler.cancel_appointment(conn, &caller, &id)?)
    })
    .await?;
    Ok(Json(view))
}

/// `PATCH /api/appointments/:id/complete`: 200 with the consultation record.
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    payload: Result<Json<ConsultationInput>, JsonRejection>,
) -> Result<Json<Consultation>, ApiError> {
    let Json(input) = payload?;
    let consultation = with_db(&ctx, move |core, conn| {
        Ok(core.scheduler.complete_appointment(conn, &caller, &id, &input)?)
    })
    .await?;
    Ok(Json(consultation))
}
