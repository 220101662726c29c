use sqlx::PgPool;

use crate::catalog::dto::{Ingredient, NewTag, Tag};

pub async fn list_tags(db: &PgPool) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY id")
        .fetch_all(db)
        .await
}

pub async fn find_tag(db: &PgPool, id: i64) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_tag(db: &PgPool, tag: &NewTag) -> Result<Tag, sqlx::Error> {
    sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (name, color, slug)
        VALUES ($1, $2, $3)
        RETURNING id, name, color, slug
        "#,
    )
    .bind(tag.name.trim())
    .bind(&tag.color)
    .bind(&tag.slug)
    .fetch_one(db)
    .await
}

/// Ingredients whose lowercased name matches `pattern` (see `services::prefix_pattern`).
pub async fn search_ingredients(
    db: &PgPool,
    pattern: Option<&str>,
) -> Result<Vec<Ingredient>, sqlx::Error> {
    sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, name, measurement_unit
          FROM ingredients
         WHERE $1::TEXT IS NULL OR lower(name) LIKE $1
         ORDER BY name, id
        "#,
    )
    .bind(pattern)
    .fetch_all(db)
    .await
}

pub async fn find_ingredient(db: &PgPool, id: i64) -> Result<Option<Ingredient>, sqlx::Error> {
    sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Inserts the ingredient unless an identical `(name, measurement_unit)` row exists.
/// Returns whether a row was written.
pub async fn insert_ingredient_if_absent(
    db: &PgPool,
    name: &str,
    measurement_unit: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO ingredients (name, measurement_unit)
        SELECT $1, $2
         WHERE NOT EXISTS (
               SELECT 1 FROM ingredients WHERE name = $1 AND measurement_unit = $2
         )
        "#,
    )
    .bind(name)
    .bind(measurement_unit)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}
