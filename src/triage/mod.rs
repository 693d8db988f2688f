//! Symptom triage: classify free-text symptoms, keep a permanent record,
//! and tell the pet's tutor the outcome.

pub mod classifier;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::db::sqlite::now_utc;
use crate::error::ServiceError;
use crate::identity::Caller;
use crate::models::enums::{NotificationType, Role};
use crate::models::{Notice, Pet, TriageResult};
use crate::notify::Notifier;

pub use classifier::{Assessment, Classifier, KeywordClassifier};

/// Upper bound on stored symptom text, in characters.
pub const MAX_SYMPTOMS_CHARS: usize = 4000;

/// Tutors act only on their own pets; veterinarians on any pet.
fn ensure_can_act_on(caller: &Caller, pet: &Pet) -> Result<(), ServiceError> {
    match caller.role {
        Role::Veterinarian => Ok(()),
        Role::Tutor | Role::Admin if pet.owner_id == caller.user_id => Ok(()),
        Role::Tutor | Role::Admin => Err(ServiceError::AccessDenied(format!(
            "user {} is not the tutor of pet {}",
            caller.user_id, pet.id
        ))),
    }
}

fn load_pet(conn: &Connection, pet_id: &str) -> Result<Pet, ServiceError> {
    db::get_pet(conn, pet_id)?.ok_or_else(|| ServiceError::NotFound(format!("Pet {pet_id}")))
}

/// Classify and record a symptom report.
///
/// The stored `tutor_id` is the pet's owner, never the caller.
pub fn submit_triage(
    conn: &Connection,
    classifier: &dyn Classifier,
    notifier: &dyn Notifier,
    caller: &Caller,
    pet_id: &str,
    symptoms: &str,
) -> Result<TriageResult, ServiceError> {
    if pet_id.trim().is_empty() {
        return Err(ServiceError::Validation("pet_id is required".into()));
    }
    let symptoms = symptoms.trim();
    if symptoms.is_empty() {
        return Err(ServiceError::Validation("symptoms are required".into()));
    }
    if symptoms.chars().count() > MAX_SYMPTOMS_CHARS {
        return Err(ServiceError::Validation(format!(
            "symptoms exceed {MAX_SYMPTOMS_CHARS} characters"
        )));
    }

    let pet = load_pet(conn, pet_id)?;
    ensure_can_act_on(caller, &pet)?;

    let assessment = classifier.classify(symptoms);
    let result = TriageResult {
        id: Uuid::new_v4().to_string(),
        pet_id: pet.id.clone(),
        tutor_id: pet.owner_id.clone(),
        symptoms: symptoms.to_string(),
        risk_level: assessment.risk_level,
        ai_summary: assessment.summary,
        recommendations: assessment.recommendations,
        created_at: now_utc(),
    };
    db::insert_triage_result(conn, &result)?;

    tracing::info!(
        triage_id = %result.id,
        pet_id = %result.pet_id,
        risk = result.risk_level.as_str(),
        "Triage recorded"
    );

    notifier.notify(Notice::new(
        &pet.owner_id,
        NotificationType::Triage,
        format!("Triagem de {}: {}", pet.name, result.risk_level.notice_label()),
        result.ai_summary.clone(),
    ));

    Ok(result)
}

/// Triage history, newest first. With a pet filter the caller must be able
/// to act on that pet; without one, tutors get all their pets' results and
/// other roles must name a pet.
pub fn list_triage(
    conn: &Connection,
    caller: &Caller,
    pet_id: Option<&str>,
) -> Result<Vec<TriageResult>, ServiceError> {
    match pet_id {
        Some(pet_id) => {
            let pet = load_pet(conn, pet_id)?;
            if caller.role != Role::Admin {
                ensure_can_act_on(caller, &pet)?;
            }
            Ok(db::list_triage_for_pet(conn, &pet.id)?)
        }
        None => match caller.role {
            Role::Tutor => Ok(db::list_triage_for_tutor(conn, &caller.user_id)?),
            Role::Veterinarian | Role::Admin => Err(ServiceError::Validation(
                "pet_id is required for this role".into(),
            )),
        },
    }
}
