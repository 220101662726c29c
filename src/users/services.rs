use std::collections::HashMap;

use tracing::info;

use crate::{
    error::{AppError, AppResult},
    pagination::Page,
    recipes::{dto::RecipeShort, repo as recipes_repo, services::short_from_row},
    relations::{self, Relationship},
    state::AppState,
    users::{
        dto::{Subscription, SubscriptionRow, SubscriptionsQuery},
        repo,
    },
};

pub async fn subscribe(
    state: &AppState,
    user_id: i64,
    author_id: i64,
    recipes_limit: Option<u32>,
) -> AppResult<Subscription> {
    relations::add(&state.db, Relationship::Subscription, user_id, author_id).await?;
    let row = repo::subscription(&state.db, user_id, author_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    info!(user_id, author_id, "subscribed");
    with_recipes(state, vec![row], recipes_limit)
        .await?
        .pop()
        .ok_or(AppError::NotFound("user"))
}

pub async fn unsubscribe(state: &AppState, user_id: i64, author_id: i64) -> AppResult<()> {
    if !repo::exists(&state.db, author_id).await? {
        return Err(AppError::NotFound("user"));
    }
    relations::remove(&state.db, Relationship::Subscription, user_id, author_id).await
}

pub async fn subscriptions(
    state: &AppState,
    user_id: i64,
    query: &SubscriptionsQuery,
) -> AppResult<Page<Subscription>> {
    let (limit, offset) = query.page_params().resolve(state.config.page_size);
    let (rows, count) = repo::subscriptions(&state.db, user_id, limit, offset).await?;
    Ok(Page {
        count,
        results: with_recipes(state, rows, query.recipes_limit).await?,
    })
}

/// Attaches each author's newest recipes, `recipes_limit` per author when given.
async fn with_recipes(
    state: &AppState,
    rows: Vec<SubscriptionRow>,
    recipes_limit: Option<u32>,
) -> AppResult<Vec<Subscription>> {
    let author_ids: Vec<i64> = rows.iter().map(|r| r.profile.id).collect();
    let shorts = recipes_repo::short_by_authors(
        &state.db,
        &author_ids,
        recipes_limit.map(i64::from),
    )
    .await?;

    let mut by_author: HashMap<i64, Vec<RecipeShort>> = HashMap::new();
    for row in shorts {
        by_author
            .entry(row.author_id)
            .or_default()
            .push(short_from_row(state.storage.as_ref(), row));
    }

    Ok(rows
        .into_iter()
        .map(|row| Subscription {
            recipes: by_author.remove(&row.profile.id).unwrap_or_default(),
            recipes_count: row.recipes_count,
            profile: row.profile,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;
    use crate::error::ValidationError;

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

    async fn seed_recipe(db: &PgPool, author_id: i64, name: &str) {
        sqlx::query(
            r#"INSERT INTO recipes (author_id, name, image, text, cooking_time)
               VALUES ($1, $2, 'recipes/x.png', 'Cook it', 10)"#,
        )
        .bind(author_id)
        .bind(name)
        .execute(db)
        .await
        .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn subscribe_returns_author_with_limited_recipes(db: PgPool) {
        let state = AppState::with_pool(db.clone());
        let reader = seed_user(&db, "reader").await;
        let author = seed_user(&db, "author").await;
        for name in ["Soup", "Stew", "Salad"] {
            seed_recipe(&db, author, name).await;
        }

        let sub = subscribe(&state, reader, author, Some(2)).await.unwrap();
        assert!(sub.profile.is_subscribed);
        assert_eq!(sub.recipes_count, 3);
        assert_eq!(sub.recipes.len(), 2);

        let err = subscribe(&state, reader, author, None).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::DuplicateRelationship(
                Relationship::Subscription
            ))
        ));

        let page = subscriptions(&state, reader, &SubscriptionsQuery::default())
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].recipes.len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn unknown_author_is_not_found(db: PgPool) {
        let state = AppState::with_pool(db.clone());
        let reader = seed_user(&db, "reader").await;

        let err = subscribe(&state, reader, 424_242, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));
        let err = unsubscribe(&state, reader, 424_242).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn unsubscribing_twice_fails(db: PgPool) {
        let state = AppState::with_pool(db.clone());
        let reader = seed_user(&db, "reader").await;
        let author = seed_user(&db, "author").await;

        subscribe(&state, reader, author, None).await.unwrap();
        unsubscribe(&state, reader, author).await.unwrap();
        let err = unsubscribe(&state, reader, author).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::RelationshipNotFound(
                Relationship::Subscription
            ))
        ));
    }
}
