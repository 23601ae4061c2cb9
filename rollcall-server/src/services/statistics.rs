//! Attendance statistics for the dashboards

use chrono::NaiveDate;
use rollcall_common::db::Student;
use rollcall_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::attendance::{self, StatusCounts};
use crate::db::{classes, students};

/// Percentage of `part` in `whole`, rounded to one decimal; 0 for an empty whole
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Per-student totals across all classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_days: i64,
    pub present_days: i64,
    pub absent_days: i64,
    pub late_days: i64,
    pub attendance_percentage: f64,
}

impl AttendanceStats {
    /// Late counts as attended; everything else recorded is absent
    pub fn from_counts(counts: StatusCounts) -> Self {
        let absent_days = (counts.total - counts.present - counts.late).max(0);
        Self {
            total_days: counts.total,
            present_days: counts.present,
            absent_days,
            late_days: counts.late,
            attendance_percentage: percentage(counts.present + counts.late, counts.total),
        }
    }
}

pub async fn student_stats(pool: &SqlitePool, student_id: i64) -> Result<AttendanceStats> {
    if students::get_student(pool, student_id).await?.is_none() {
        return Err(Error::NotFound(format!("Student not found: {}", student_id)));
    }

    let counts = attendance::status_counts_for_student(pool, student_id).await?;
    Ok(AttendanceStats::from_counts(counts))
}

/// Today's figures across a teacher's rosters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherStats {
    pub total_active_students: i64,
    pub present_today: i64,
    pub absent_today: i64,
    pub attendance_rate: f64,
}

/// Teacher aggregate for `today`
///
/// A teacher without classes (or an unknown teacher id) has empty rosters
/// and gets all zeros.
pub async fn teacher_stats(pool: &SqlitePool, teacher_id: i64, today: NaiveDate) -> Result<TeacherStats> {
    let total = classes::count_roster_for_teacher(pool, teacher_id).await?;
    if total == 0 {
        return Ok(TeacherStats::default());
    }

    let present = attendance::count_attended_for_teacher_on(pool, teacher_id, today).await?;

    Ok(TeacherStats {
        total_active_students: total,
        present_today: present,
        absent_today: (total - present).max(0),
        attendance_rate: percentage(present, total),
    })
}

/// One child of a guardian with their figures
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildStats {
    pub student: Student,
    pub stats: AttendanceStats,
}

pub async fn parent_stats(pool: &SqlitePool, parent_id: i64) -> Result<Vec<ChildStats>> {
    let children = students::list_students_by_parent(pool, parent_id).await?;

    let mut result = Vec::with_capacity(children.len());
    for student in children {
        let counts = attendance::status_counts_for_student(pool, student.id).await?;
        result.push(ChildStats {
            student,
            stats: AttendanceStats::from_counts(counts),
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_is_zero_percent() {
        let stats = AttendanceStats::from_counts(StatusCounts::default());
        assert_eq!(stats, AttendanceStats::default());
        assert_eq!(stats.attendance_percentage, 0.0);
    }

    #[test]
    fn test_late_counts_as_attended() {
        let stats = AttendanceStats::from_counts(StatusCounts {
            total: 3,
            present: 1,
            late: 1,
        });
        assert_eq!(stats.absent_days, 1);
        assert_eq!(stats.present_days + stats.late_days + stats.absent_days, stats.total_days);
        assert_eq!(stats.attendance_percentage, 66.7);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(5, 5), 100.0);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
