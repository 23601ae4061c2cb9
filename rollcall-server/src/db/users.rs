//! User database operations

use rollcall_common::db::{Role, User};
use rollcall_common::time::{format_timestamp, now, parse_timestamp};
use rollcall_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};

/// User fields supplied at creation
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Insert a user; runs on a pool or inside a caller's transaction
pub async fn create_user<'e, E>(executor: E, user: &NewUser) -> Result<User>
where
    E: SqliteExecutor<'e>,
{
    let created_at = now();

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, role, first_name, last_name, email, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&user.username)
    .bind(user.role.as_str())
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(format_timestamp(created_at))
    .fetch_one(executor)
    .await
    .map_err(|e| match Error::from(e) {
        err if err.is_unique_violation() => Error::Conflict(format!(
            "Username '{}' or email '{}' already registered",
            user.username, user.email
        )),
        err => err,
    })?;

    Ok(User {
        id,
        username: user.username.clone(),
        role: user.role,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        created_at,
    })
}

pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, username, role, first_name, last_name, email, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        "SELECT id, username, role, first_name, last_name, email, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        role: role.parse()?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_common::db::init_memory_database;

    fn parent() -> NewUser {
        NewUser {
            username: "parent1".to_string(),
            role: Role::Parent,
            first_name: "Mary".to_string(),
            last_name: "Chen".to_string(),
            email: "mary.chen@email.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_load_user() {
        let pool = init_memory_database().await.unwrap();
        let created = create_user(&pool, &parent()).await.unwrap();

        let loaded = get_user(&pool, created.id).await.unwrap().unwrap();
        assert_eq!(loaded.username, "parent1");
        assert_eq!(loaded.role, Role::Parent);
        assert_eq!(loaded.created_at, created.created_at);

        let by_name = get_user_by_username(&pool, "parent1").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert!(get_user(&pool, created.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let pool = init_memory_database().await.unwrap();
        create_user(&pool, &parent()).await.unwrap();

        let err = create_user(&pool, &parent()).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
