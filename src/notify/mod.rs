//! Notification dispatcher.
//!
//! Lifecycle and triage events are pushed onto an outbound queue and
//! persisted by a delivery task, decoupled from the operation that raised
//! them. Delivery is best-effort: a missing recipient or a failed write is
//! logged and dropped, and never reaches the caller of the triggering
//! operation.

pub mod delivery;

use rusqlite::Connection;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::sqlite::now_utc;
use crate::db::{self, DatabaseError};
use crate::error::ServiceError;
use crate::identity::Caller;
use crate::models::{Notice, Notification};

pub use delivery::{deliver, spawn_delivery, DeliveryHandle};

/// Sink for outbound notices. Must not block and must not fail the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Queue-backed notifier. Cloning shares the same queue.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for NotificationDispatcher {
    fn notify(&self, notice: Notice) {
        let recipient = notice.recipient_user_id.clone();
        if self.tx.send(notice).is_err() {
            tracing::warn!(%recipient, "Notification queue closed, notice dropped");
        }
    }
}

/// Notifier that drops everything. Used where no delivery is wired up.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!(recipient = %notice.recipient_user_id, "Notice discarded");
    }
}

/// Notifications listing with unread count.
#[derive(Debug, serde::Serialize)]
pub struct Inbox {
    pub unread: i64,
    pub notifications: Vec<Notification>,
}

pub fn list_inbox(conn: &Connection, caller: &Caller) -> Result<Inbox, DatabaseError> {
    Ok(Inbox {
        unread: db::count_unread_notifications(conn, &caller.user_id)?,
        notifications: db::list_notifications_for(conn, &caller.user_id)?,
    })
}

/// Mark one of the caller's notifications read. Someone else's id is
/// reported as not found so ids cannot be guessed.
pub fn mark_read(conn: &Connection, notification_id: &str, caller: &Caller) -> Result<(), ServiceError> {
    db::mark_notification_read(conn, notification_id, &caller.user_id).map_err(|e| match e {
        DatabaseError::NotFound { .. } => {
            ServiceError::NotFound(format!("Notification {notification_id}"))
        }
        other => ServiceError::Database(other),
    })
}

pub fn mark_all_read(conn: &Connection, caller: &Caller) -> Result<usize, ServiceError> {
    Ok(db::mark_all_notifications_read(conn, &caller.user_id)?)
}

pub(crate) fn new_notification(notice: &Notice) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        recipient_user_id: notice.recipient_user_id.clone(),
        kind: notice.kind,
        title: notice.title.clone(),
        message: notice.message.clone(),
        link: notice.link.clone(),
        read: false,
        created_at: now_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::{seed_directory, TUTOR, VET};
    use crate::models::enums::{NotificationType, Role};

    #[test]
    fn dispatcher_queues_without_blocking() {
        let (dispatcher, mut rx) = NotificationDispatcher::channel();
        dispatcher.notify(Notice::new(TUTOR, NotificationType::Info, "t", "m"));
        let got = rx.try_recv().unwrap();
        assert_eq!(got.recipient_user_id, TUTOR);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_is_swallowed() {
        let (dispatcher, rx) = NotificationDispatcher::channel();
        drop(rx);
        dispatcher.notify(Notice::new(TUTOR, NotificationType::Info, "t", "m"));
    }

    #[test]
    fn inbox_and_read_marking_are_owner_scoped() {
        let conn = open_memory_database().unwrap();
        seed_directory(&conn);
        let tutor = Caller::new(TUTOR, Role::Tutor);
        let vet = Caller::new(VET, Role::Veterinarian);

        let n = deliver(&conn, &Notice::new(TUTOR, NotificationType::Triage, "t", "m"))
            .unwrap()
            .unwrap();
        deliver(&conn, &Notice::new(TUTOR, NotificationType::Info, "t2", "m2")).unwrap();

        let inbox = list_inbox(&conn, &tutor).unwrap();
        assert_eq!(inbox.unread, 2);
        assert_eq!(inbox.notifications.len(), 2);

        assert!(matches!(
            mark_read(&conn, &n.id, &vet),
            Err(ServiceError::NotFound(_))
        ));
        mark_read(&conn, &n.id, &tutor).unwrap();
        // Marking twice stays a success.
        mark_read(&conn, &n.id, &tutor).unwrap();
        assert_eq!(list_inbox(&conn, &tutor).unwrap().unread, 1);

        assert_eq!(mark_all_read(&conn, &tutor).unwrap(), 1);
        assert_eq!(list_inbox(&conn, &tutor).unwrap().unread, 0);
        assert_eq!(list_inbox(&conn, &vet).unwrap().notifications.len(), 0);
    }
}
