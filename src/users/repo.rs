use sqlx::PgPool;

use crate::users::dto::{Profile, SubscriptionRow};

// $1 is the viewer; anonymous viewers are never subscribed.
const PROFILE_SELECT: &str = r#"
    SELECT u.email, u.id, u.username, u.first_name, u.last_name,
           EXISTS (SELECT 1 FROM subscriptions s
                    WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed
      FROM users u
"#;

pub async fn list(
    db: &PgPool,
    viewer: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Profile>, i64), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    let rows = sqlx::query_as::<_, Profile>(&format!(
        "{PROFILE_SELECT} ORDER BY u.id LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok((rows, count))
}

pub async fn find(db: &PgPool, viewer: Option<i64>, id: i64) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!("{PROFILE_SELECT} WHERE u.id = $2"))
        .bind(viewer)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn exists(db: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await
}

/// Authors `user_id` follows, oldest subscription first, with their recipe totals.
pub async fn subscriptions(
    db: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<(Vec<SubscriptionRow>, i64), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    let rows = sqlx::query_as::<_, SubscriptionRow>(
        r#"
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
               TRUE AS is_subscribed,
               (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
          FROM subscriptions s
          JOIN users u ON u.id = s.author_id
         WHERE s.user_id = $1
         ORDER BY s.id
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok((rows, count))
}

pub async fn subscription(
    db: &PgPool,
    user_id: i64,
    author_id: i64,
) -> Result<Option<SubscriptionRow>, sqlx::Error> {
    sqlx::query_as::<_, SubscriptionRow>(
        r#"
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
               EXISTS (SELECT 1 FROM subscriptions s
                        WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed,
               (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
          FROM users u
         WHERE u.id = $2
        "#,
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(db)
    .await
}
