use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User};

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, is_admin, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Insert a new user. Duplicate email/username surface as unique violations.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.email)
        .bind(new.username)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn set_password_hash(
        db: &PgPool,
        id: i64,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
