use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::{Appointment, AppointmentView, Consultation};

const VIEW_SELECT: &str =
    "SELECT a.id, a.pet_id, a.tutor_id, a.vet_id, a.scheduled_at, a.reason, a.status,
            a.created_at, a.updated_at, p.name, t.name, v.name
     FROM appointments a
     LEFT JOIN pets p ON p.id = a.pet_id
     LEFT JOIN users t ON t.id = a.tutor_id
     LEFT JOIN users v ON v.id = a.vet_id";

type AppointmentRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
);

fn read_appointment_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn appointment_from_row(raw: AppointmentRow) -> Result<Appointment, DatabaseError> {
    let (id, pet_id, tutor_id, vet_id, scheduled_at, reason, status, created_at, updated_at) = raw;
    Ok(Appointment {
        id,
        pet_id,
        tutor_id,
        vet_id,
        scheduled_at: parse_timestamp("scheduled_at", &scheduled_at)?,
        reason,
        status: AppointmentStatus::from_str(&status)?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn query_views(
    conn: &Connection,
    filter: &str,
    param: Option<&str>,
) -> Result<Vec<AppointmentView>, DatabaseError> {
    let sql = format!("{VIEW_SELECT} {filter} ORDER BY a.scheduled_at DESC");
    let mut stmt = conn.prepare(&sql)?;

    let map = |row: &Row<'_>| {
        Ok((
            read_appointment_row(row)?,
            row.get::<_, Option<String>>(9)?,
            row.get::<_, Option<String>>(10)?,
            row.get::<_, Option<String>>(11)?,
        ))
    };
    let rows = match param {
        Some(p) => stmt.query_map(params![p], map)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map)?.collect::<Result<Vec<_>, _>>()?,
    };

    rows.into_iter()
        .map(|(raw, pet_name, tutor_name, vet_name)| {
            Ok(AppointmentView {
                appointment: appointment_from_row(raw)?,
                pet_name,
                tutor_name,
                vet_name,
            })
        })
        .collect()
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, pet_id, tutor_id, vet_id, scheduled_at, reason, status,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            appt.id,
            appt.pet_id,
            appt.tutor_id,
            appt.vet_id,
            format_timestamp(&appt.scheduled_at),
            appt.reason,
            appt.status.as_str(),
            format_timestamp(&appt.created_at),
            format_timestamp(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> Result<Option<Appointment>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT id, pet_id, tutor_id, vet_id, scheduled_at, reason, status, created_at, updated_at
             FROM appointments WHERE id = ?1",
            params![id],
            read_appointment_row,
        )
        .optional()?;
    raw.map(appointment_from_row).transpose()
}

pub fn get_appointment_view(
    conn: &Connection,
    id: &str,
) -> Result<Option<AppointmentView>, DatabaseError> {
    Ok(query_views(conn, "WHERE a.id = ?1", Some(id))?.into_iter().next())
}

pub fn list_appointments_by_vet(
    conn: &Connection,
    vet_id: &str,
) -> Result<Vec<AppointmentView>, DatabaseError> {
    query_views(conn, "WHERE a.vet_id = ?1", Some(vet_id))
}

pub fn list_appointments_by_tutor(
    conn: &Connection,
    tutor_id: &str,
) -> Result<Vec<AppointmentView>, DatabaseError> {
    query_views(conn, "WHERE a.tutor_id = ?1", Some(tutor_id))
}

pub fn list_all_appointments(conn: &Connection) -> Result<Vec<AppointmentView>, DatabaseError> {
    query_views(conn, "", None)
}

/// Active (PENDING/CONFIRMED) appointments of a vet whose start lies in
/// the open interval `(after, before)`.
pub fn find_active_between(
    conn: &Connection,
    vet_id: &str,
    after: &NaiveDateTime,
    before: &NaiveDateTime,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, tutor_id, vet_id, scheduled_at, reason, status, created_at, updated_at
         FROM appointments
         WHERE vet_id = ?1 AND status IN ('PENDING', 'CONFIRMED')
           AND scheduled_at > ?2 AND scheduled_at < ?3
         ORDER BY scheduled_at",
    )?;
    let rows = stmt.query_map(
        params![vet_id, format_timestamp(after), format_timestamp(before)],
        read_appointment_row,
    )?;
    rows.collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(appointment_from_row)
        .collect()
}

/// Active appointments of a vet starting exactly at `at`.
pub fn find_active_at(
    conn: &Connection,
    vet_id: &str,
    at: &NaiveDateTime,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, tutor_id, vet_id, scheduled_at, reason, status, created_at, updated_at
         FROM appointments
         WHERE vet_id = ?1 AND status IN ('PENDING', 'CONFIRMED') AND scheduled_at = ?2",
    )?;
    let rows = stmt.query_map(params![vet_id, format_timestamp(at)], read_appointment_row)?;
    rows.collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(appointment_from_row)
        .collect()
}

/// Sole writer of `status`. `updated_at` never moves backwards.
pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: &AppointmentStatus,
    at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = MAX(updated_at, ?2) WHERE id = ?3",
        params![status.as_str(), format_timestamp(at), id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: id.into(),
        });
    }
    Ok(())
}

pub fn insert_consultation(conn: &Connection, c: &Consultation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO consultations (id, appointment_id, vet_id, diagnosis, treatment,
         observations, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            c.id,
            c.appointment_id,
            c.vet_id,
            c.diagnosis,
            c.treatment,
            c.observations,
            format_timestamp(&c.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_consultation_for_appointment(
    conn: &Connection,
    appointment_id: &str,
) -> Result<Option<Consultation>, DatabaseError> {
    let raw = conn
        .query_row(
            "SELECT id, appointment_id, vet_id, diagnosis, treatment, observations, created_at
             FROM consultations WHERE appointment_id = ?1",
            params![appointment_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    match raw {
        Some((id, appointment_id, vet_id, diagnosis, treatment, observations, created_at)) => {
            Ok(Some(Consultation {
                id,
                appointment_id,
                vet_id,
                diagnosis,
                treatment,
                observations,
                created_at: parse_timestamp("created_at", &created_at)?,
            }))
        }
        None => Ok(None),
    }
}
