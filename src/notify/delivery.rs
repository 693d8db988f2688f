//! Delivery side of the notification queue.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::{self, DatabaseError};
use crate::models::{Notice, Notification};

use super::new_notification;

/// Persist one notice. Returns `None` when the recipient does not exist.
pub fn deliver(conn: &Connection, notice: &Notice) -> Result<Option<Notification>, DatabaseError> {
    if db::get_user(conn, &notice.recipient_user_id)?.is_none() {
        tracing::warn!(
            recipient = %notice.recipient_user_id,
            "Notification recipient not found, skipping"
        );
        return Ok(None);
    }
    let notification = new_notification(notice);
    db::insert_notification(conn, &notification)?;
    tracing::debug!(
        recipient = %notification.recipient_user_id,
        kind = notification.kind.as_str(),
        "Notification delivered"
    );
    Ok(Some(notification))
}

/// Persist a batch over one connection. The schema is migrated at startup,
/// so only pragmas are applied here. Failures are logged per notice.
fn deliver_batch(path: &Path, batch: &[Notice]) {
    let conn = match db::open_connection(path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, dropped = batch.len(), "Notification delivery failed");
            return;
        }
    };
    for notice in batch {
        if let Err(e) = deliver(&conn, notice) {
            tracing::error!(
                recipient = %notice.recipient_user_id,
                error = %e,
                "Notification delivery failed"
            );
        }
    }
}

/// Handle to the running delivery task.
pub struct DeliveryHandle {
    task: JoinHandle<usize>,
}

impl DeliveryHandle {
    /// Wait for the queue to drain. Resolves once every dispatcher clone is
    /// dropped; returns the number of notices processed.
    pub async fn finish(self) -> usize {
        self.task.await.unwrap_or_else(|e| {
            tracing::error!("Notification delivery task failed: {e}");
            0
        })
    }
}

/// Spawn the task that drains the queue into the database at `db_path`.
/// Whatever is queued when the task wakes is written as one batch on the
/// blocking pool.
pub fn spawn_delivery(mut rx: mpsc::UnboundedReceiver<Notice>, db_path: PathBuf) -> DeliveryHandle {
    let task = tokio::spawn(async move {
        let mut processed = 0usize;
        while let Some(first) = rx.recv().await {
            let mut batch = vec![first];
            while let Ok(more) = rx.try_recv() {
                batch.push(more);
            }
            processed += batch.len();

            let path = db_path.clone();
            let outcome =
                tokio::task::spawn_blocking(move || deliver_batch(&path, &batch)).await;
            if let Err(e) = outcome {
                tracing::error!("Notification delivery worker panicked: {e}");
            }
        }
        tracing::info!(processed, "Notification delivery stopped");
        processed
    });
    DeliveryHandle { task }
}
