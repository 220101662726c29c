//! Favorites, shopping-cart membership and subscriptions.
//!
//! All three are `(user, target)` join rows guarded by a unique constraint, so they share one
//! add/remove implementation. The unique constraint is what actually prevents duplicates; a
//! concurrent second insert fails in the store and is reported as
//! [`ValidationError::DuplicateRelationship`].

use std::fmt;

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Favorite,
    ShoppingCart,
    Subscription,
}

impl Relationship {
    fn table(self) -> &'static str {
        match self {
            Relationship::Favorite => "favorites",
            Relationship::ShoppingCart => "shopping_cart",
            Relationship::Subscription => "subscriptions",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            Relationship::Favorite | Relationship::ShoppingCart => "recipe_id",
            Relationship::Subscription => "author_id",
        }
    }

    pub fn duplicate_message(self) -> &'static str {
        match self {
            Relationship::Favorite => "recipe is already in favorites",
            Relationship::ShoppingCart => "recipe is already in the shopping cart",
            Relationship::Subscription => "you are already subscribed to this author",
        }
    }

    pub fn missing_message(self) -> &'static str {
        match self {
            Relationship::Favorite => "recipe is not in favorites",
            Relationship::ShoppingCart => "recipe is not in the shopping cart",
            Relationship::Subscription => "you are not subscribed to this author",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Inserts the `(user_id, target_id)` row.
pub async fn add(
    db: &PgPool,
    relationship: Relationship,
    user_id: i64,
    target_id: i64,
) -> AppResult<()> {
    if relationship == Relationship::Subscription && user_id == target_id {
        return Err(ValidationError::SelfReferenceNotAllowed.into());
    }

    let sql = format!(
        "INSERT INTO {} (user_id, {}) VALUES ($1, $2)",
        relationship.table(),
        relationship.target_column()
    );
    sqlx::query(&sql)
        .bind(user_id)
        .bind(target_id)
        .execute(db)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                debug!(%relationship, user_id, target_id, "duplicate rejected by constraint");
                AppError::from(ValidationError::DuplicateRelationship(relationship))
            } else {
                AppError::from(e)
            }
        })?;

    info!(%relationship, user_id, target_id, "relationship added");
    Ok(())
}

/// Deletes exactly the `(user_id, target_id)` row.
pub async fn remove(
    db: &PgPool,
    relationship: Relationship,
    user_id: i64,
    target_id: i64,
) -> AppResult<()> {
    let sql = format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        relationship.table(),
        relationship.target_column()
    );
    let result = sqlx::query(&sql)
        .bind(user_id)
        .bind(target_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ValidationError::RelationshipNotFound(relationship).into());
    }

    info!(%relationship, user_id, target_id, "relationship removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn self_subscription_is_rejected_before_the_store() {
        // Lazy pool: reaching the database here would fail with a connection error instead.
        let state = crate::state::AppState::fake();
        let err = add(&state.db, Relationship::Subscription, 7, 7)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::SelfReferenceNotAllowed)
        ));
    }

    #[test]
    fn messages_name_the_relationship() {
        assert_eq!(
            ValidationError::DuplicateRelationship(Relationship::Favorite).to_string(),
            "recipe is already in favorites"
        );
        assert_eq!(
            ValidationError::RelationshipNotFound(Relationship::Subscription).to_string(),
            "you are not subscribed to this author"
        );
    }

    async fn seed_user(db: &PgPool, name: &str) -> i64 {
        sqlx::query_scalar(
            r#"INSERT INTO users (email, username, first_name, last_name, password_hash)
               VALUES ($1, $2, 'First', 'Last', 'x') RETURNING id"#,
        )
        .bind(format!("{name}@example.com"))
        .bind(name)
        .fetch_one(db)
        .await
        .unwrap()
    }

    async fn seed_recipe(db: &PgPool, author_id: i64) -> i64 {
        sqlx::query_scalar(
            r#"INSERT INTO recipes (author_id, name, image, text, cooking_time)
               VALUES ($1, 'Soup', 'recipes/soup.png', 'Boil it', 10) RETURNING id"#,
        )
        .bind(author_id)
        .fetch_one(db)
        .await
        .unwrap()
    }

    async fn exists(
        db: &PgPool,
        relationship: Relationship,
        user_id: i64,
        target_id: i64,
    ) -> AppResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1 AND {} = $2)",
            relationship.table(),
            relationship.target_column()
        );
        let found: bool = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(target_id)
            .fetch_one(db)
            .await?;
        Ok(found)
    }

    async fn count_rows(db: &PgPool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn duplicate_favorite_leaves_one_row(db: PgPool) {
        let user = seed_user(&db, "alice").await;
        let recipe = seed_recipe(&db, user).await;

        add(&db, Relationship::Favorite, user, recipe).await.unwrap();
        let err = add(&db, Relationship::Favorite, user, recipe)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationError::DuplicateRelationship(
                Relationship::Favorite
            ))
        ));
        assert_eq!(count_rows(&db, "favorites").await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn self_subscription_stores_nothing(db: PgPool) {
        let user = seed_user(&db, "bob").await;
        let err = add(&db, Relationship::Subscription, user, user)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::SelfReferenceNotAllowed)
        ));
        assert_eq!(count_rows(&db, "subscriptions").await, 0);

        // The check constraint is the authoritative guard even without the early return.
        let raw = sqlx::query("INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $1)")
            .bind(user)
            .execute(&db)
            .await
            .unwrap_err();
        assert!(matches!(
            AppError::from(raw),
            AppError::Validation(ValidationError::SelfReferenceNotAllowed)
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn removing_a_missing_row_fails(db: PgPool) {
        let user = seed_user(&db, "carol").await;
        let recipe = seed_recipe(&db, user).await;

        let err = remove(&db, Relationship::ShoppingCart, user, recipe)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::RelationshipNotFound(
                Relationship::ShoppingCart
            ))
        ));

        add(&db, Relationship::ShoppingCart, user, recipe).await.unwrap();
        assert!(exists(&db, Relationship::ShoppingCart, user, recipe).await.unwrap());
        remove(&db, Relationship::ShoppingCart, user, recipe).await.unwrap();
        assert!(!exists(&db, Relationship::ShoppingCart, user, recipe).await.unwrap());
    }
}
