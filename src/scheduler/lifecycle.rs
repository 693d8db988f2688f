//! Appointment state machine and the actor rules attached to each edge.
//!
//! ```text
//! PENDING ──confirm (assigned vet)──▶ CONFIRMED
//! PENDING | CONFIRMED ──cancel (tutor)──▶ CANCELLED
//! PENDING | CONFIRMED ──complete (assigned vet)──▶ COMPLETED
//! ```
//!
//! CANCELLED and COMPLETED are terminal. The actor check runs before the
//! state check, so a stranger learns nothing about an appointment's state.

use thiserror::Error;

use crate::error::ServiceError;
use crate::identity::Caller;
use crate::models::enums::{AppointmentStatus, Role};
use crate::models::Appointment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Confirm,
    Cancel,
    Complete,
}

impl Action {
    pub fn target(self) -> AppointmentStatus {
        match self {
            Action::Confirm => AppointmentStatus::Confirmed,
            Action::Cancel => AppointmentStatus::Cancelled,
            Action::Complete => AppointmentStatus::Completed,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::Cancel => "cancel",
            Action::Complete => "complete",
        }
    }
}

/// What a permitted action does to the stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(AppointmentStatus),
    /// Already in the target state; nothing to write, nobody to notify.
    Unchanged,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{0}")]
    Forbidden(String),
    #[error("Invalid transition from {from} to {to}")]
    Invalid {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Forbidden(msg) => ServiceError::AccessDenied(msg),
            TransitionError::Invalid { from, to } => ServiceError::InvalidTransition { from, to },
        }
    }
}

fn is_assigned_vet(appt: &Appointment, caller: &Caller) -> bool {
    caller.role == Role::Veterinarian && caller.user_id == appt.vet_id
}

fn is_tutor(appt: &Appointment, caller: &Caller) -> bool {
    caller.role == Role::Tutor && caller.user_id == appt.tutor_id
}

/// Decide whether `caller` may perform `action` on `appt` in its current state.
pub fn check_transition(
    appt: &Appointment,
    action: Action,
    caller: &Caller,
) -> Result<TransitionOutcome, TransitionError> {
    let allowed = match action {
        Action::Confirm | Action::Complete => is_assigned_vet(appt, caller),
        Action::Cancel => is_tutor(appt, caller),
    };
    if !allowed {
        return Err(TransitionError::Forbidden(format!(
            "user {} may not {} appointment {}",
            caller.user_id,
            action.verb(),
            appt.id
        )));
    }

    let (from, to) = (appt.status, action.target());
    if from.is_terminal() {
        return Err(TransitionError::Invalid { from, to });
    }
    if from == to {
        return Ok(TransitionOutcome::Unchanged);
    }
    Ok(TransitionOutcome::Applied(to))
}
