//! Appointment store: the only code that writes `appointments.status`.
//!
//! Writes run inside `BEGIN IMMEDIATE` so the read that precedes each write
//! sees the latest committed state, also across processes sharing the file.

use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::conflict::ConflictDetector;
use super::lifecycle::{check_transition, Action, TransitionOutcome};
use crate::db::{self, DatabaseError};
use crate::error::ServiceError;
use crate::identity::Caller;
use crate::models::{Appointment, AppointmentView, Consultation};

fn begin_immediate(conn: &Connection) -> Result<Transaction<'_>, DatabaseError> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

fn commit(tx: Transaction<'_>) -> Result<(), DatabaseError> {
    Ok(tx.commit()?)
}

fn slot_conflict(appt: &Appointment) -> ServiceError {
    ServiceError::SlotConflict {
        vet_id: appt.vet_id.clone(),
        scheduled_at: db::format_timestamp(&appt.scheduled_at),
    }
}

/// Insert `appt` unless it collides with an active booking of the same vet.
/// Nothing is written on any error.
pub fn create(
    conn: &Connection,
    detector: &ConflictDetector,
    appt: &Appointment,
) -> Result<(), ServiceError> {
    let tx = begin_immediate(conn)?;

    if let Some(existing) = detector.find_conflict(&tx, &appt.vet_id, &appt.scheduled_at)? {
        tracing::info!(
            vet_id = %appt.vet_id,
            requested = %appt.scheduled_at,
            existing = %existing.id,
            "Booking rejected: slot taken"
        );
        return Err(slot_conflict(appt));
    }

    match db::insert_appointment(&tx, appt) {
        Ok(()) => {}
        Err(e) if e.is_unique_violation() => return Err(slot_conflict(appt)),
        Err(e) => return Err(e.into()),
    }

    commit(tx)?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<AppointmentView, ServiceError> {
    db::get_appointment_view(conn, id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Appointment {id}")))
}

pub fn list_by_vet(conn: &Connection, vet_id: &str) -> Result<Vec<AppointmentView>, ServiceError> {
    Ok(db::list_appointments_by_vet(conn, vet_id)?)
}

pub fn list_by_tutor(
    conn: &Connection,
    tutor_id: &str,
) -> Result<Vec<AppointmentView>, ServiceError> {
    Ok(db::list_appointments_by_tutor(conn, tutor_id)?)
}

/// Apply `action` for `caller` at time `at`. `on_applied` runs inside the
/// same transaction after the status write, so side records commit or roll
/// back together with it.
pub fn transition_with<F>(
    conn: &Connection,
    id: &str,
    action: Action,
    caller: &Caller,
    at: &NaiveDateTime,
    on_applied: F,
) -> Result<(Appointment, TransitionOutcome), ServiceError>
where
    F: FnOnce(&Connection, &Appointment) -> Result<(), ServiceError>,
{
    let tx = begin_immediate(conn)?;

    let mut appt = db::get_appointment(&tx, id)?
        .ok_or_else(|| ServiceError::NotFound(format!("Appointment {id}")))?;
    let outcome = check_transition(&appt, action, caller)?;

    if let TransitionOutcome::Applied(status) = outcome {
        db::update_appointment_status(&tx, id, &status, at)?;
        appt.status = status;
        appt.updated_at = appt.updated_at.max(*at);
        on_applied(&tx, &appt)?;
        commit(tx)?;
        tracing::info!(appointment_id = %id, status = status.as_str(), actor = %caller.user_id, "Appointment transitioned");
    }

    Ok((appt, outcome))
}

pub fn transition(
    conn: &Connection,
    id: &str,
    action: Action,
    caller: &Caller,
    at: &NaiveDateTime,
) -> Result<(Appointment, TransitionOutcome), ServiceError> {
    transition_with(conn, id, action, caller, at, |_, _| Ok(()))
}

/// Close an appointment with its clinical record.
pub fn complete(
    conn: &Connection,
    id: &str,
    caller: &Caller,
    consultation: &Consultation,
) -> Result<Appointment, ServiceError> {
    let (appt, _) = transition_with(
        conn,
        id,
        Action::Complete,
        caller,
        &consultation.created_at,
        |tx, _| Ok(db::insert_consultation(tx, consultation)?),
    )?;
    Ok(appt)
}
