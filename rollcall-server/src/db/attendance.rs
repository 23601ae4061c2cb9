//! Attendance record database operations
//!
//! Inserts take a connection so the attendance writer can run a whole batch
//! inside one transaction. The (student, class, day) unique constraint lives
//! in the schema.

use chrono::NaiveDate;
use rollcall_common::db::{AttendanceRecord, NewAttendanceRecord};
use rollcall_common::time::{format_day, format_timestamp, now, parse_day, parse_timestamp};
use rollcall_common::Result;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

const RECORD_COLUMNS: &str = "a.id, a.student_id, a.class_id, a.attendance_date, a.status, a.marked_at, \
     a.recognition_confidence, a.notes, a.marked_by, a.method, a.created_at";

/// Raw per-student status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: i64,
    pub present: i64,
    pub late: i64,
}

/// Student fields shown next to a class listing entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: i64,
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
}

/// Attendance record joined with its student
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAttendanceEntry {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub student: StudentSummary,
}

/// Insert a record; a duplicate (student, class, day) surfaces as a
/// unique-violation database error
pub async fn insert_record(
    conn: &mut SqliteConnection,
    record: &NewAttendanceRecord,
) -> Result<AttendanceRecord> {
    let created_at = now();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO attendance_records (
            student_id, class_id, attendance_date, status, marked_at,
            recognition_confidence, notes, marked_by, method, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(record.student_id)
    .bind(record.class_id)
    .bind(format_day(record.attendance_date))
    .bind(record.status.as_str())
    .bind(format_timestamp(record.marked_at))
    .bind(record.recognition_confidence)
    .bind(&record.notes)
    .bind(record.marked_by)
    .bind(record.method.as_str())
    .bind(format_timestamp(created_at))
    .fetch_one(&mut *conn)
    .await?;

    Ok(materialize(id, record, created_at))
}

/// Insert a record unless one already exists for the same (student, class, day)
///
/// Returns `None` when the existing entry was kept.
pub async fn insert_record_if_absent(
    conn: &mut SqliteConnection,
    record: &NewAttendanceRecord,
) -> Result<Option<AttendanceRecord>> {
    let created_at = now();

    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO attendance_records (
            student_id, class_id, attendance_date, status, marked_at,
            recognition_confidence, notes, marked_by, method, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (student_id, class_id, attendance_date) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(record.student_id)
    .bind(record.class_id)
    .bind(format_day(record.attendance_date))
    .bind(record.status.as_str())
    .bind(format_timestamp(record.marked_at))
    .bind(record.recognition_confidence)
    .bind(&record.notes)
    .bind(record.marked_by)
    .bind(record.method.as_str())
    .bind(format_timestamp(created_at))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id.map(|id| materialize(id, record, created_at)))
}

fn materialize(
    id: i64,
    record: &NewAttendanceRecord,
    created_at: chrono::DateTime<chrono::Utc>,
) -> AttendanceRecord {
    AttendanceRecord {
        id,
        student_id: record.student_id,
        class_id: record.class_id,
        attendance_date: record.attendance_date,
        status: record.status,
        marked_at: record.marked_at,
        recognition_confidence: record.recognition_confidence,
        notes: record.notes.clone(),
        marked_by: record.marked_by,
        method: record.method,
        created_at,
    }
}

/// Entry for one (student, class, day), if any
pub async fn find_record(
    pool: &SqlitePool,
    student_id: i64,
    class_id: i64,
    day: NaiveDate,
) -> Result<Option<AttendanceRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM attendance_records a
         WHERE a.student_id = ? AND a.class_id = ? AND a.attendance_date = ?",
        RECORD_COLUMNS
    ))
    .bind(student_id)
    .bind(class_id)
    .bind(format_day(day))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// All entries for a class on one day, joined with student names
pub async fn list_by_class_and_day(
    pool: &SqlitePool,
    class_id: i64,
    day: NaiveDate,
) -> Result<Vec<ClassAttendanceEntry>> {
    let rows = sqlx::query(&format!(
        "SELECT {}, s.student_code, s.first_name, s.last_name
         FROM attendance_records a
         JOIN students s ON s.id = a.student_id
         WHERE a.class_id = ? AND a.attendance_date = ?
         ORDER BY s.student_code",
        RECORD_COLUMNS
    ))
    .bind(class_id)
    .bind(format_day(day))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let record = record_from_row(row)?;
            Ok(ClassAttendanceEntry {
                student: StudentSummary {
                    id: record.student_id,
                    student_code: row.try_get("student_code")?,
                    first_name: row.try_get("first_name")?,
                    last_name: row.try_get("last_name")?,
                },
                record,
            })
        })
        .collect()
}

/// Count a student's entries by status across all history
pub async fn status_counts_for_student(pool: &SqlitePool, student_id: i64) -> Result<StatusCounts> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN status = 'present' THEN 1 ELSE 0 END), 0) AS present,
               COALESCE(SUM(CASE WHEN status = 'late' THEN 1 ELSE 0 END), 0) AS late
        FROM attendance_records
        WHERE student_id = ?
        "#,
    )
    .bind(student_id)
    .fetch_one(pool)
    .await?;

    Ok(StatusCounts {
        total: row.try_get("total")?,
        present: row.try_get("present")?,
        late: row.try_get("late")?,
    })
}

/// Distinct roster students marked present or late on `day` in any of the
/// teacher's classes
pub async fn count_attended_for_teacher_on(
    pool: &SqlitePool,
    teacher_id: i64,
    day: NaiveDate,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT a.student_id)
        FROM attendance_records a
        JOIN classes c ON c.id = a.class_id
        JOIN students s ON s.id = a.student_id
        WHERE c.teacher_id = ?
          AND a.attendance_date = ?
          AND a.status IN ('present', 'late')
          AND s.is_active = 1
          AND s.grade = c.grade
          AND s.section = c.section
        "#,
    )
    .bind(teacher_id)
    .bind(format_day(day))
    .fetch_one(pool)
    .await?;

    Ok(count)
}

fn record_from_row(row: &SqliteRow) -> Result<AttendanceRecord> {
    let attendance_date: String = row.try_get("attendance_date")?;
    let status: String = row.try_get("status")?;
    let method: String = row.try_get("method")?;
    let marked_at: String = row.try_get("marked_at")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        class_id: row.try_get("class_id")?,
        attendance_date: parse_day(&attendance_date)?,
        status: status.parse()?,
        marked_at: parse_timestamp(&marked_at)?,
        recognition_confidence: row.try_get("recognition_confidence")?,
        notes: row.try_get("notes")?,
        marked_by: row.try_get("marked_by")?,
        method: method.parse()?,
        created_at: parse_timestamp(&created_at)?,
    })
}
