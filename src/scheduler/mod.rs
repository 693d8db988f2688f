//! Appointment scheduler: booking, confirmation, cancellation and
//! completion, with role checks and conflict-safe booking.
//!
//! Booking holds the vet's slot lock and an IMMEDIATE transaction for the
//! conflict check and the insert. Notices are handed to the notifier only
//! after both are released.

pub mod conflict;
pub mod lifecycle;
pub mod slot_lock;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db;
use crate::db::sqlite::{now_utc, truncate_to_seconds};
use crate::error::ServiceError;
use crate::identity::Caller;
use crate::models::enums::{AppointmentStatus, NotificationType, Role};
use crate::models::{Appointment, AppointmentView, Consultation, Notice};
use crate::notify::Notifier;

pub use conflict::{ConflictDetector, ConflictPolicy};
pub use lifecycle::{Action, TransitionError, TransitionOutcome};
pub use slot_lock::SlotLocks;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Bookable years. A conflict window around any instant in this range
/// still formats as a four-digit year, so stored timestamps keep sorting
/// in time order.
pub const MIN_SCHEDULE_YEAR: i32 = 1;
pub const MAX_SCHEDULE_YEAR: i32 = 9998;

/// Parse an ISO-8601 instant. Offsets are normalised to UTC; values
/// without one are taken as UTC. Sub-second precision is dropped.
pub fn parse_scheduled_at(raw: &str) -> Result<NaiveDateTime, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceError::Validation("scheduled_at is required".into()));
    }
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        })
        .ok_or_else(|| ServiceError::Validation(format!("invalid scheduled_at '{raw}'")))?;
    if !(MIN_SCHEDULE_YEAR..=MAX_SCHEDULE_YEAR).contains(&parsed.year()) {
        return Err(ServiceError::Validation(format!(
            "scheduled_at '{raw}' is outside years {MIN_SCHEDULE_YEAR:04}-{MAX_SCHEDULE_YEAR}"
        )));
    }
    Ok(truncate_to_seconds(parsed))
}

fn display_time(at: &NaiveDateTime) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

fn appointment_link(id: &str) -> String {
    format!("/appointments/{id}")
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub pet_id: String,
    #[serde(default)]
    pub vet_id: String,
    #[serde(default)]
    pub scheduled_at: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationInput {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub observations: Option<String>,
}

fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub struct Scheduler {
    detector: ConflictDetector,
    locks: SlotLocks,
    notifier: Arc<dyn Notifier>,
}

impl Scheduler {
    pub fn new(policy: ConflictPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            detector: ConflictDetector::new(policy),
            locks: SlotLocks::new(),
            notifier,
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.detector.policy()
    }

    /// Book a PENDING appointment for `req.pet_id` with `req.vet_id`.
    ///
    /// Tutors book for their own pets; vets book on behalf of the pet's
    /// owner. The stored tutor is always the pet's owner.
    pub fn book_appointment(
        &self,
        conn: &Connection,
        caller: &Caller,
        req: &BookingRequest,
    ) -> Result<AppointmentView, ServiceError> {
        let pet_id = required("pet_id", &req.pet_id)?;
        let vet_id = required("vet_id", &req.vet_id)?;
        let scheduled_at = parse_scheduled_at(&req.scheduled_at)?;

        let pet = db::get_pet(conn, &pet_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Pet {pet_id}")))?;
        let vet = db::get_user(conn, &vet_id)?
            .filter(|u| u.role == Role::Veterinarian)
            .ok_or_else(|| ServiceError::NotFound(format!("Veterinarian {vet_id}")))?;

        if caller.role != Role::Veterinarian && pet.owner_id != caller.user_id {
            return Err(ServiceError::AccessDenied(format!(
                "user {} is not the tutor of pet {}",
                caller.user_id, pet.id
            )));
        }

        let now = now_utc();
        let appt = Appointment {
            id: Uuid::new_v4().to_string(),
            pet_id: pet.id.clone(),
            tutor_id: pet.owner_id.clone(),
            vet_id: vet.id.clone(),
            scheduled_at,
            reason: optional_text(req.reason.as_deref()),
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.locks
            .with_vet(&vet.id, || store::create(conn, &self.detector, &appt))?;

        tracing::info!(
            appointment_id = %appt.id,
            vet_id = %appt.vet_id,
            scheduled_at = %appt.scheduled_at,
            booked_by = %caller.user_id,
            "Appointment booked"
        );

        let when = display_time(&appt.scheduled_at);
        let link = appointment_link(&appt.id);
        self.notifier.notify(
            Notice::new(
                &appt.vet_id,
                NotificationType::Appointment,
                "Nova consulta agendada",
                format!("Consulta para {} em {when} aguarda confirmação.", pet.name),
            )
            .with_link(&link),
        );
        self.notifier.notify(
            Notice::new(
                &appt.tutor_id,
                NotificationType::Appointment,
                "Consulta solicitada",
                format!("A consulta de {} com {} em {when} foi solicitada.", pet.name, vet.name),
            )
            .with_link(&link),
        );

        store::get(conn, &appt.id)
    }

    /// Assigned vet confirms. Confirming twice is a silent success.
    pub fn confirm_appointment(
        &self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
    ) -> Result<AppointmentView, ServiceError> {
        let (appt, outcome) = store::transition(conn, id, Action::Confirm, caller, &now_utc())?;
        if outcome != TransitionOutcome::Unchanged {
            self.notifier.notify(
                Notice::new(
                    &appt.tutor_id,
                    NotificationType::Appointment,
                    "Consulta confirmada",
                    format!(
                        "Sua consulta de {} foi confirmada.",
                        display_time(&appt.scheduled_at)
                    ),
                )
                .with_link(appointment_link(&appt.id)),
            );
        }
        store::get(conn, id)
    }

    /// The appointment's tutor cancels a PENDING or CONFIRMED booking.
    pub fn cancel_appointment(
        &self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
    ) -> Result<AppointmentView, ServiceError> {
        let (appt, _) = store::transition(conn, id, Action::Cancel, caller, &now_utc())?;
        self.notifier.notify(
            Notice::new(
                &appt.vet_id,
                NotificationType::Appointment,
                "Consulta cancelada",
                format!(
                    "A consulta de {} foi cancelada pelo tutor.",
                    display_time(&appt.scheduled_at)
                ),
            )
            .with_link(appointment_link(&appt.id)),
        );
        store::get(conn, id)
    }

    /// Assigned vet records the consultation, closing the appointment.
    pub fn complete_appointment(
        &self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
        input: &ConsultationInput,
    ) -> Result<Consultation, ServiceError> {
        let consultation = Consultation {
            id: Uuid::new_v4().to_string(),
            appointment_id: id.to_string(),
            vet_id: caller.user_id.clone(),
            diagnosis: required("diagnosis", &input.diagnosis)?,
            treatment: required("treatment", &input.treatment)?,
            observations: optional_text(input.observations.as_deref()),
            created_at: now_utc(),
        };
        let appt = store::complete(conn, id, caller, &consultation)?;

        let pet_name = db::get_pet(conn, &appt.pet_id)?
            .map(|p| p.name)
            .unwrap_or_else(|| appt.pet_id.clone());
        self.notifier.notify(
            Notice::new(
                &appt.tutor_id,
                NotificationType::Success,
                "Consulta registrada",
                format!(
                    "Uma consulta para {pet_name} foi registrada em {}.",
                    consultation.created_at.format("%d/%m/%Y")
                ),
            )
            .with_link(appointment_link(&appt.id)),
        );
        Ok(consultation)
    }

    /// Caller-scoped listing, newest `scheduled_at` first.
    pub fn list_appointments(
        &self,
        conn: &Connection,
        caller: &Caller,
    ) -> Result<Vec<AppointmentView>, ServiceError> {
        match caller.role {
            Role::Veterinarian => store::list_by_vet(conn, &caller.user_id),
            Role::Tutor => store::list_by_tutor(conn, &caller.user_id),
            Role::Admin => Ok(db::list_all_appointments(conn)?),
        }
    }

    /// One appointment, visible to its tutor, its vet, and admins.
    pub fn get_appointment(
        &self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
    ) -> Result<AppointmentView, ServiceError> {
        let view = store::get(conn, id)?;
        let appt = &view.appointment;
        let visible = match caller.role {
            Role::Admin => true,
            Role::Veterinarian => appt.vet_id == caller.user_id,
            Role::Tutor => appt.tutor_id == caller.user_id,
        };
        if !visible {
            return Err(ServiceError::AccessDenied(format!(
                "user {} may not view appointment {id}",
                caller.user_id
            )));
        }
        Ok(view)
    }
}
