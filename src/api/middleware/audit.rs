//! Audit logging middleware.
//!
//! Logs every API request with caller, method, path, and response
//! status. Runs innermost (after auth has injected `CallerContext`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, CallerContext};

pub async fn log_access(
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let action = format!("{} {}", req.method(), req.uri().path());
    let ctx = req.extensions().get::<ApiContext>().cloned();
    let caller = req.extensions().get::<CallerContext>().map(|c| c.0.clone());

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        ctx.core
            .log_access(caller.as_ref(), &action, response.status().as_u16());
    }

    response
}
