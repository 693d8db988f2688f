use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::AppointmentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub pet_id: String,
    pub tutor_id: String,
    pub vet_id: String,
    pub scheduled_at: NaiveDateTime,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Appointment with display names joined at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub pet_name: Option<String>,
    pub tutor_name: Option<String>,
    pub vet_name: Option<String>,
}

/// Clinical record written when a vet closes an appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: String,
    pub appointment_id: String,
    pub vet_id: String,
    pub diagnosis: String,
    pub treatment: String,
    pub observations: Option<String>,
    pub created_at: NaiveDateTime,
}
