//! Domain error taxonomy shared by the scheduler and triage services.
//!
//! Every variant except `Database` is client-facing and carries a stable
//! code (see `ServiceError::code`). None are retried by the core.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Slot conflict: vet {vet_id} already has an active booking near {scheduled_at}")]
    SlotConflict { vet_id: String, scheduled_at: String },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::AccessDenied(_) => "ACCESS_DENIED",
            ServiceError::SlotConflict { .. } => "SLOT_CONFLICT",
            ServiceError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ServiceError::Internal(_) | ServiceError::Database(_) => "INTERNAL",
        }
    }
}
