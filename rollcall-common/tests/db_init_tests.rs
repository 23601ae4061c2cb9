//! Database initialization tests
//!
//! Covers automatic creation, idempotent re-open and the attendance
//! uniqueness constraint enforced by the schema.

use rollcall_common::db::init::{init_database, init_memory_database};
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn table_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

async fn seed_student_and_class(pool: &SqlitePool) {
    sqlx::query(
        "INSERT INTO users (id, username, role, first_name, last_name, email, created_at)
         VALUES (1, 'prof.johnson', 'teacher', 'John', 'Johnson', 'prof@school.edu', '2024-01-01T00:00:00+00:00')",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO students (id, student_code, first_name, last_name, grade, section, created_at)
         VALUES (1, 'STU001', 'Alex', 'Johnson', '10', 'A', '2024-01-01T00:00:00+00:00')",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO classes (id, name, subject, teacher_id, grade, section, created_at)
         VALUES (1, 'Mathematics', 'Mathematics', 1, '10', 'A', '2024-01-01T00:00:00+00:00')",
    )
    .execute(pool)
    .await
    .unwrap();
}

async fn insert_attendance(pool: &SqlitePool, day: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attendance_records
            (student_id, class_id, attendance_date, status, marked_at, method, created_at)
         VALUES (1, 1, ?, 'present', '2024-01-01T08:00:00+00:00', 'manual', '2024-01-01T08:00:00+00:00')",
    )
    .bind(day)
    .execute(pool)
    .await
    .map(|_| ())
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("rollcall.db");

    let pool = init_database(&db_path).await.expect("database should initialize");

    assert!(db_path.exists(), "Database file was not created");
    assert_eq!(
        table_names(&pool).await,
        vec!["attendance_records", "classes", "notifications", "students", "users"]
    );
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("rollcall.db");

    let first = init_database(&db_path).await.unwrap();
    seed_student_and_class(&first).await;
    first.close().await;

    let second = init_database(&db_path).await.expect("re-open should succeed");
    let students: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
        .fetch_one(&second)
        .await
        .unwrap();
    assert_eq!(students, 1, "existing rows survive schema re-application");
}

#[tokio::test]
async fn test_attendance_unique_per_student_class_day() {
    let pool = init_memory_database().await.unwrap();
    seed_student_and_class(&pool).await;

    insert_attendance(&pool, "2024-05-06").await.unwrap();
    insert_attendance(&pool, "2024-05-07").await.unwrap();

    let duplicate = insert_attendance(&pool, "2024-05-06").await;
    match duplicate {
        Err(sqlx::Error::Database(e)) => assert!(e.is_unique_violation()),
        other => panic!("expected unique violation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_attendance_requires_existing_student() {
    let pool = init_memory_database().await.unwrap();
    seed_student_and_class(&pool).await;

    let result = sqlx::query(
        "INSERT INTO attendance_records
            (student_id, class_id, attendance_date, status, marked_at, method, created_at)
         VALUES (99, 1, '2024-05-06', 'present', '2024-05-06T08:00:00+00:00', 'manual', '2024-05-06T08:00:00+00:00')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "foreign keys should be enforced");
}
