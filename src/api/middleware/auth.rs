//! Bearer credential authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it to a caller
//! through the identity context, and injects `CallerContext` into
//! request extensions for downstream handlers.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::identity;

pub async fn require_auth(
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

/// Source used when the transport supplies no peer address.
pub const UNKNOWN_SOURCE: &str = "peer:unknown";

/// Lockout key: the peer IP, stable across whatever token is presented.
pub fn lockout_source(req: &Request<axum::body::Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("peer:{}", addr.ip()))
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    // 1. Extract bearer token
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let source = lockout_source(&req);

    {
        let mut lockout = ctx
            .auth_lockout
            .lock()
            .map_err(|_| ApiError::Internal("lockout lock".into()))?;
        if lockout.is_locked(&source) {
            tracing::warn!(source, "Rejected request from locked-out source");
            return Err(ApiError::Unauthorized);
        }
    }

    let token = token.ok_or(ApiError::Unauthorized)?;

    // 2. Resolve against the token table
    let core = ctx.core.clone();
    let resolved = tokio::task::spawn_blocking(move || {
        let conn = core.open_db()?;
        identity::resolve_caller(&conn, &token).map_err(ApiError::from)
    })
    .await?;

    let caller = match resolved {
        Ok(caller) => caller,
        Err(ApiError::Unauthorized) => {
            if let Ok(mut lockout) = ctx.auth_lockout.lock() {
                lockout.record_failure(&source);
            }
            return Err(ApiError::Unauthorized);
        }
        Err(other) => return Err(other),
    };

    if let Ok(mut lockout) = ctx.auth_lockout.lock() {
        lockout.clear(&source);
    }

    // 3. Inject caller context for downstream handlers
    req.extensions_mut().insert(CallerContext(caller));

    // 4. Process request
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}
