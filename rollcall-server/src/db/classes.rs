//! Class database operations

use rollcall_common::db::Class;
use rollcall_common::time::{format_timestamp, now, parse_timestamp};
use rollcall_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};

#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub subject: String,
    pub teacher_id: i64,
    pub grade: String,
    pub section: String,
    pub schedule: Option<String>,
}

pub async fn create_class<'e, E>(executor: E, class: &NewClass) -> Result<Class>
where
    E: SqliteExecutor<'e>,
{
    let created_at = now();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO classes (name, subject, teacher_id, grade, section, schedule, is_active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?)
        RETURNING id
        "#,
    )
    .bind(&class.name)
    .bind(&class.subject)
    .bind(class.teacher_id)
    .bind(&class.grade)
    .bind(&class.section)
    .bind(&class.schedule)
    .bind(format_timestamp(created_at))
    .fetch_one(executor)
    .await?;

    Ok(Class {
        id,
        name: class.name.clone(),
        subject: class.subject.clone(),
        teacher_id: class.teacher_id,
        grade: class.grade.clone(),
        section: class.section.clone(),
        schedule: class.schedule.clone(),
        is_active: true,
        created_at,
    })
}

pub async fn get_class(pool: &SqlitePool, id: i64) -> Result<Option<Class>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, subject, teacher_id, grade, section, schedule, is_active, created_at
        FROM classes
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(class_from_row).transpose()
}

pub async fn list_classes_by_teacher(pool: &SqlitePool, teacher_id: i64) -> Result<Vec<Class>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, subject, teacher_id, grade, section, schedule, is_active, created_at
        FROM classes
        WHERE teacher_id = ?
        ORDER BY id
        "#,
    )
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(class_from_row).collect()
}

/// Distinct active students on the rosters of the teacher's classes
///
/// A roster is every active student sharing the class's grade and section.
pub async fn count_roster_for_teacher(pool: &SqlitePool, teacher_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT s.id)
        FROM students s
        JOIN classes c ON c.grade = s.grade AND c.section = s.section
        WHERE c.teacher_id = ? AND s.is_active = 1
        "#,
    )
    .bind(teacher_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

fn class_from_row(row: &SqliteRow) -> Result<Class> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Class {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        subject: row.try_get("subject")?,
        teacher_id: row.try_get("teacher_id")?,
        grade: row.try_get("grade")?,
        section: row.try_get("section")?,
        schedule: row.try_get("schedule")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::students::{create_student, deactivate_student, NewStudent};
    use crate::db::users::{create_user, NewUser};
    use rollcall_common::db::{init_memory_database, Role};

    async fn teacher(pool: &SqlitePool, username: &str) -> i64 {
        create_user(
            pool,
            &NewUser {
                username: username.to_string(),
                role: Role::Teacher,
                first_name: "Robert".to_string(),
                last_name: "Johnson".to_string(),
                email: format!("{}@school.edu", username),
            },
        )
        .await
        .unwrap()
        .id
    }

    fn class(teacher_id: i64, grade: &str, section: &str) -> NewClass {
        NewClass {
            name: format!("Mathematics {}{}", grade, section),
            subject: "Mathematics".to_string(),
            teacher_id,
            grade: grade.to_string(),
            section: section.to_string(),
            schedule: Some(r#"{"days":["Mon","Wed"]}"#.to_string()),
        }
    }

    async fn student(pool: &SqlitePool, code: &str, grade: &str, section: &str) -> i64 {
        create_student(
            pool,
            &NewStudent {
                student_code: code.to_string(),
                first_name: "Student".to_string(),
                last_name: code.to_string(),
                grade: grade.to_string(),
                section: section.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_create_and_list_classes() {
        let pool = init_memory_database().await.unwrap();
        let teacher_id = teacher(&pool, "prof.johnson").await;

        let created = create_class(&pool, &class(teacher_id, "10", "A")).await.unwrap();
        let loaded = get_class(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Mathematics 10A");
        assert!(loaded.is_active);

        assert_eq!(list_classes_by_teacher(&pool, teacher_id).await.unwrap().len(), 1);
        assert!(list_classes_by_teacher(&pool, teacher_id + 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roster_counts_distinct_active_students() {
        let pool = init_memory_database().await.unwrap();
        let teacher_id = teacher(&pool, "prof.johnson").await;
        let other_teacher = teacher(&pool, "prof.smith").await;

        // Two classes for the same grade/section must not double count
        create_class(&pool, &class(teacher_id, "10", "A")).await.unwrap();
        create_class(&pool, &class(teacher_id, "10", "A")).await.unwrap();
        create_class(&pool, &class(other_teacher, "11", "B")).await.unwrap();

        student(&pool, "STU001", "10", "A").await;
        let leaving = student(&pool, "STU002", "10", "A").await;
        student(&pool, "STU003", "11", "B").await;
        deactivate_student(&pool, leaving).await.unwrap();

        assert_eq!(count_roster_for_teacher(&pool, teacher_id).await.unwrap(), 1);
        assert_eq!(count_roster_for_teacher(&pool, other_teacher).await.unwrap(), 1);
        assert_eq!(count_roster_for_teacher(&pool, 9999).await.unwrap(), 0);
    }
}
