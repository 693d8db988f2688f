//! API endpoint handlers, one module per resource.
//!
//! Handlers run their database work on the blocking pool through
//! `with_db`, each call on its own connection.

pub mod appointments;
pub mod health;
pub mod notifications;
pub mod triage;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

pub(crate) async fn with_db<T, F>(ctx: &ApiContext, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&CoreState, &Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || {
        let conn = core.open_db()?;
        f(&core, &conn)
    })
    .await?
}
