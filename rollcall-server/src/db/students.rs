//! Student (identity) database operations
//!
//! Students are soft-deactivated, never deleted.

use rollcall_common::db::Student;
use rollcall_common::time::{format_timestamp, now, parse_timestamp};
use rollcall_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};

const STUDENT_COLUMNS: &str = "id, student_code, user_id, first_name, last_name, grade, section, \
     parent_id, profile_image, face_template, is_active, created_at";

/// Student fields supplied at registration
#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub student_code: String,
    pub user_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub grade: String,
    pub section: String,
    pub parent_id: Option<i64>,
    pub profile_image: Option<String>,
}

pub async fn create_student<'e, E>(executor: E, student: &NewStudent) -> Result<Student>
where
    E: SqliteExecutor<'e>,
{
    let created_at = now();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO students (
            student_code, user_id, first_name, last_name, grade, section,
            parent_id, profile_image, is_active, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
        RETURNING id
        "#,
    )
    .bind(&student.student_code)
    .bind(student.user_id)
    .bind(&student.first_name)
    .bind(&student.last_name)
    .bind(&student.grade)
    .bind(&student.section)
    .bind(student.parent_id)
    .bind(&student.profile_image)
    .bind(format_timestamp(created_at))
    .fetch_one(executor)
    .await
    .map_err(|e| match Error::from(e) {
        err if err.is_unique_violation() => Error::Conflict(format!(
            "Student code '{}' already registered",
            student.student_code
        )),
        err => err,
    })?;

    Ok(Student {
        id,
        student_code: student.student_code.clone(),
        user_id: student.user_id,
        first_name: student.first_name.clone(),
        last_name: student.last_name.clone(),
        grade: student.grade.clone(),
        section: student.section.clone(),
        parent_id: student.parent_id,
        profile_image: student.profile_image.clone(),
        face_template: None,
        is_active: true,
        created_at,
    })
}

pub async fn get_student(pool: &SqlitePool, id: i64) -> Result<Option<Student>> {
    let row = sqlx::query(&format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(student_from_row).transpose()
}

pub async fn get_student_by_code(pool: &SqlitePool, code: &str) -> Result<Option<Student>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM students WHERE student_code = ?",
        STUDENT_COLUMNS
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(student_from_row).transpose()
}

/// Resolve a recognizer identity to an active student
///
/// An active student with that code wins; otherwise a purely numeric
/// identity falls back to the row id. Inactive students never resolve.
pub async fn resolve_identity(pool: &SqlitePool, identity: &str) -> Result<Option<Student>> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Ok(None);
    }

    if let Some(student) = get_student_by_code(pool, identity).await?.filter(|s| s.is_active) {
        return Ok(Some(student));
    }

    match identity.parse::<i64>() {
        Ok(id) => Ok(get_student(pool, id).await?.filter(|s| s.is_active)),
        Err(_) => Ok(None),
    }
}

/// All active students, ordered by code
pub async fn list_active_students(pool: &SqlitePool) -> Result<Vec<Student>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM students WHERE is_active = 1 ORDER BY student_code",
        STUDENT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(student_from_row).collect()
}

/// Students whose guardian is `parent_id`
pub async fn list_students_by_parent(pool: &SqlitePool, parent_id: i64) -> Result<Vec<Student>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM students WHERE parent_id = ? ORDER BY student_code",
        STUDENT_COLUMNS
    ))
    .bind(parent_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(student_from_row).collect()
}

/// Attach the recognizer's opaque template; returns false if the student is gone
pub async fn set_face_template(pool: &SqlitePool, id: i64, template: &[u8]) -> Result<bool> {
    let result = sqlx::query("UPDATE students SET face_template = ? WHERE id = ?")
        .bind(template)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-deactivate a student
pub async fn deactivate_student(pool: &SqlitePool, id: i64) -> Result<Student> {
    let result = sqlx::query("UPDATE students SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Student not found: {}", id)));
    }

    get_student(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Student not found: {}", id)))
}

fn student_from_row(row: &SqliteRow) -> Result<Student> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Student {
        id: row.try_get("id")?,
        student_code: row.try_get("student_code")?,
        user_id: row.try_get("user_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        grade: row.try_get("grade")?,
        section: row.try_get("section")?,
        parent_id: row.try_get("parent_id")?,
        profile_image: row.try_get("profile_image")?,
        face_template: row.try_get("face_template")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
