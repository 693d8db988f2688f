use std::str::FromStr;

use rusqlite::{params, Connection, Row};

use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::RiskLevel;
use crate::models::TriageResult;

type TriageRow = (String, String, String, String, String, String, String, String);

fn read_triage_row(row: &Row<'_>) -> rusqlite::Result<TriageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn triage_from_row(raw: TriageRow) -> Result<TriageResult, DatabaseError> {
    let (id, pet_id, tutor_id, symptoms, risk_level, ai_summary, recommendations, created_at) = raw;
    Ok(TriageResult {
        id,
        pet_id,
        tutor_id,
        symptoms,
        risk_level: RiskLevel::from_str(&risk_level)?,
        ai_summary,
        recommendations,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

/// Triage results are insert-only; the table rejects updates and deletes.
pub fn insert_triage_result(conn: &Connection, result: &TriageResult) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO triage_results (id, pet_id, tutor_id, symptoms, risk_level, ai_summary,
         recommendations, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            result.id,
            result.pet_id,
            result.tutor_id,
            result.symptoms,
            result.risk_level.as_str(),
            result.ai_summary,
            result.recommendations,
            format_timestamp(&result.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_triage_for_pet(
    conn: &Connection,
    pet_id: &str,
) -> Result<Vec<TriageResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, tutor_id, symptoms, risk_level, ai_summary, recommendations, created_at
         FROM triage_results WHERE pet_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![pet_id], read_triage_row)?;
    rows.collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(triage_from_row)
        .collect()
}

pub fn list_triage_for_tutor(
    conn: &Connection,
    tutor_id: &str,
) -> Result<Vec<TriageResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, pet_id, tutor_id, symptoms, risk_level, ai_summary, recommendations, created_at
         FROM triage_results WHERE tutor_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![tutor_id], read_triage_row)?;
    rows.collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(triage_from_row)
        .collect()
}
