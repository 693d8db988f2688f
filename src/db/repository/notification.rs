use std::str::FromStr;

use rusqlite::{params, Connection, Row};

use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::NotificationType;
use crate::models::Notification;

type NotificationRow = (String, String, String, String, String, Option<String>, i32, String);

fn read_notification_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
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

pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (id, recipient_user_id, type, title, message, link, read,
         created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            n.id,
            n.recipient_user_id,
            n.kind.as_str(),
            n.title,
            n.message,
            n.link,
            n.read as i32,
            format_timestamp(&n.created_at),
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn list_notifications_for(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient_user_id, type, title, message, link, read, created_at
         FROM notifications WHERE recipient_user_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![user_id], read_notification_row)?;

    let mut notifications = Vec::new();
    for row in rows {
        let (id, recipient_user_id, kind, title, message, link, read, created_at) = row?;
        notifications.push(Notification {
            id,
            recipient_user_id,
            kind: NotificationType::from_str(&kind)?,
            title,
            message,
            link,
            read: read != 0,
            created_at: parse_timestamp("created_at", &created_at)?,
        });
    }
    Ok(notifications)
}

/// Mark one notification read. Only matches when `user_id` is the recipient.
pub fn mark_notification_read(
    conn: &Connection,
    id: &str,
    user_id: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND recipient_user_id = ?2",
        params![id, user_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Notification".into(),
            id: id.into(),
        });
    }
    Ok(())
}

/// Returns how many notifications flipped to read.
pub fn mark_all_notifications_read(conn: &Connection, user_id: &str) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET read = 1 WHERE recipient_user_id = ?1 AND read = 0",
        params![user_id],
    )?;
    Ok(changed)
}

pub fn count_unread_notifications(conn: &Connection, user_id: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_user_id = ?1 AND read = 0",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
