//! Guardian notifications
//!
//! Recognition notices are sent after the attendance transaction commits.
//! A failed notice is logged and counted, never propagated.

use rollcall_common::db::{NewNotification, Notification, NotificationKind, Student};
use rollcall_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::notifications;
use crate::services::attendance_writer::MarkedAttendance;

/// Tally of one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub sent: usize,
    pub without_guardian: usize,
    pub failed: usize,
}

/// Notice telling `guardian_id` that `student` was auto-marked present
pub fn recognition_notice(student: &Student, guardian_id: i64) -> NewNotification {
    NewNotification {
        user_id: guardian_id,
        kind: NotificationKind::Attendance,
        title: format!("{} marked present", student.first_name),
        message: format!(
            "{} was automatically marked present using facial recognition",
            student.full_name()
        ),
        student_id: Some(student.id),
    }
}

/// One notice per created entry whose student has a guardian
pub async fn dispatch_recognition_notices(
    pool: &SqlitePool,
    marked: &[MarkedAttendance],
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for entry in marked {
        let Some(guardian_id) = entry.student.parent_id else {
            report.without_guardian += 1;
            continue;
        };

        match notifications::create_notification(pool, &recognition_notice(&entry.student, guardian_id)).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                warn!(
                    student_id = entry.student.id,
                    guardian_id,
                    error = %e,
                    "Failed to send attendance notification"
                );
                report.failed += 1;
            }
        }
    }

    report
}

pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Notification>> {
    notifications::list_for_user(pool, user_id).await
}

/// Mark one notification read and return it
pub async fn mark_read(pool: &SqlitePool, id: i64) -> Result<Notification> {
    if !notifications::mark_read(pool, id).await? {
        return Err(Error::NotFound(format!("Notification not found: {}", id)));
    }

    notifications::get_notification(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Notification not found: {}", id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_recognition_notice_text() {
        let student = Student {
            id: 2,
            student_code: "STU002".to_string(),
            user_id: None,
            first_name: "Sarah".to_string(),
            last_name: "Chen".to_string(),
            grade: "10".to_string(),
            section: "A".to_string(),
            parent_id: Some(7),
            profile_image: None,
            face_template: None,
            is_active: true,
            created_at: Utc::now(),
        };

        let notice = recognition_notice(&student, 7);
        assert_eq!(notice.user_id, 7);
        assert_eq!(notice.kind, NotificationKind::Attendance);
        assert_eq!(notice.title, "Sarah marked present");
        assert_eq!(
            notice.message,
            "Sarah Chen was automatically marked present using facial recognition"
        );
        assert_eq!(notice.student_id, Some(2));
    }
}
