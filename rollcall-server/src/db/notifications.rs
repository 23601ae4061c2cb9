//! Notification database operations

use rollcall_common::db::{NewNotification, Notification};
use rollcall_common::time::{format_timestamp, now, parse_timestamp};
use rollcall_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

pub async fn create_notification(pool: &SqlitePool, notification: &NewNotification) -> Result<Notification> {
    let created_at = now();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO notifications (user_id, kind, title, message, is_read, student_id, created_at)
        VALUES (?, ?, ?, ?, 0, ?, ?)
        RETURNING id
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.student_id)
    .bind(format_timestamp(created_at))
    .fetch_one(pool)
    .await?;

    Ok(Notification {
        id,
        user_id: notification.user_id,
        kind: notification.kind,
        title: notification.title.clone(),
        message: notification.message.clone(),
        is_read: false,
        student_id: notification.student_id,
        created_at,
    })
}

pub async fn get_notification(pool: &SqlitePool, id: i64) -> Result<Option<Notification>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, kind, title, message, is_read, student_id, created_at
        FROM notifications
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(notification_from_row).transpose()
}

/// A user's notifications, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, kind, title, message, is_read, student_id, created_at
        FROM notifications
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(notification_from_row).collect()
}

/// Set the read flag; returns false if no such notification exists
pub async fn mark_read(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification> {
    let kind: String = row.try_get("kind")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: kind.parse()?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        is_read: row.try_get("is_read")?,
        student_id: row.try_get("student_id")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
