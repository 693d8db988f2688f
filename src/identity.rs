//! Identity context: resolves an opaque bearer credential to a caller.
//!
//! Credentials are random URL-safe tokens. Only their SHA-256 hash is
//! stored; the caller's role always comes from the `users` table, never
//! from the request.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{self, DatabaseError};
use crate::models::enums::Role;

/// The authenticated `(user_id, role)` pair every core operation acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Unknown or revoked credential")]
    InvalidCredential,
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Hash a bearer token string using SHA-256 (hex encoded).
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Issue a new credential for an existing user. Returns the plain token,
/// which is not recoverable afterwards.
pub fn issue_token(conn: &Connection, user_id: &str) -> Result<String, IdentityError> {
    if db::get_user(conn, user_id)?.is_none() {
        return Err(IdentityError::UnknownUser(user_id.to_string()));
    }
    let token = generate_token();
    db::insert_token_hash(conn, &hash_token(&token), user_id)?;
    tracing::info!(user_id, "Issued API token");
    Ok(token)
}

pub fn revoke_token(conn: &Connection, token: &str) -> Result<bool, IdentityError> {
    Ok(db::revoke_token_hash(conn, &hash_token(token))?)
}

/// Resolve a bearer token to the caller it was issued for.
pub fn resolve_caller(conn: &Connection, token: &str) -> Result<Caller, IdentityError> {
    let user_id = db::find_token_owner(conn, &hash_token(token))?
        .ok_or(IdentityError::InvalidCredential)?;
    let user = db::get_user(conn, &user_id)?
        .ok_or_else(|| IdentityError::UnknownUser(user_id.clone()))?;
    Ok(Caller {
        user_id: user.id,
        role: user.role,
    })
}
