use rusqlite::{params, Connection, OptionalExtension};

use crate::db::sqlite::{format_timestamp, now_utc};
use crate::db::DatabaseError;

pub fn insert_token_hash(
    conn: &Connection,
    token_hash: &str,
    user_id: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO api_tokens (token_hash, user_id, issued_at) VALUES (?1, ?2, ?3)",
        params![token_hash, user_id, format_timestamp(&now_utc())],
    )?;
    Ok(())
}

/// Resolve a non-revoked token hash to its user id.
pub fn find_token_owner(conn: &Connection, token_hash: &str) -> Result<Option<String>, DatabaseError> {
    conn.query_row(
        "SELECT user_id FROM api_tokens WHERE token_hash = ?1 AND revoked = 0",
        params![token_hash],
        |row| row.get(0),
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn revoke_token_hash(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE api_tokens SET revoked = 1 WHERE token_hash = ?1 AND revoked = 0",
        params![token_hash],
    )?;
    Ok(changed > 0)
}
