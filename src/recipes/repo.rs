use sqlx::{PgPool, Postgres, Transaction};

use crate::recipes::dto::{RecipeFilter, ValidRecipe};
use crate::recipes::repo_types::{
    IngredientLineRow, Ownership, RecipeRow, RecipeTagRow, ShortRecipeRow,
};
use crate::recipes::shopping::CartLine;

// $1 is the viewer (NULL for anonymous callers) in every query built on this.
const RECIPE_SELECT: &str = r#"
    SELECT r.id, r.author_id, r.name, r.image, r.text, r.cooking_time,
           u.email      AS author_email,
           u.username   AS author_username,
           u.first_name AS author_first_name,
           u.last_name  AS author_last_name,
           EXISTS (SELECT 1 FROM subscriptions s
                    WHERE s.user_id = $1 AND s.author_id = r.author_id) AS author_is_subscribed,
           EXISTS (SELECT 1 FROM favorites f
                    WHERE f.user_id = $1 AND f.recipe_id = r.id)        AS is_favorited,
           EXISTS (SELECT 1 FROM shopping_cart c
                    WHERE c.user_id = $1 AND c.recipe_id = r.id)        AS is_in_shopping_cart
      FROM recipes r
      JOIN users u ON u.id = r.author_id
"#;

const RECIPE_FILTER: &str = r#"
     WHERE ($2::BIGINT IS NULL OR r.author_id = $2)
       AND ($3::TEXT[] IS NULL OR EXISTS (
               SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
                WHERE rt.recipe_id = r.id AND t.slug = ANY($3)))
       AND (NOT $4::BOOLEAN OR EXISTS (
               SELECT 1 FROM favorites f WHERE f.user_id = $1::BIGINT AND f.recipe_id = r.id))
       AND (NOT $5::BOOLEAN OR EXISTS (
               SELECT 1 FROM shopping_cart c WHERE c.user_id = $1::BIGINT AND c.recipe_id = r.id))
"#;

pub async fn list(
    db: &PgPool,
    viewer: Option<i64>,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<RecipeRow>, i64), sqlx::Error> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM recipes r {RECIPE_FILTER}"
    ))
    .bind(viewer)
    .bind(filter.author)
    .bind(&filter.tags)
    .bind(filter.favorited_only)
    .bind(filter.in_cart_only)
    .fetch_one(db)
    .await?;

    let rows = sqlx::query_as::<_, RecipeRow>(&format!(
        "{RECIPE_SELECT} {RECIPE_FILTER} ORDER BY r.pub_date DESC, r.id DESC LIMIT $6 OFFSET $7"
    ))
    .bind(viewer)
    .bind(filter.author)
    .bind(&filter.tags)
    .bind(filter.favorited_only)
    .bind(filter.in_cart_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    Ok((rows, count))
}

pub async fn find(
    db: &PgPool,
    viewer: Option<i64>,
    id: i64,
) -> Result<Option<RecipeRow>, sqlx::Error> {
    sqlx::query_as::<_, RecipeRow>(&format!("{RECIPE_SELECT} WHERE r.id = $2"))
        .bind(viewer)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn tags_for(db: &PgPool, recipe_ids: &[i64]) -> Result<Vec<RecipeTagRow>, sqlx::Error> {
    sqlx::query_as::<_, RecipeTagRow>(
        r#"
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
          FROM recipe_tags rt
          JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id = ANY($1)
         ORDER BY t.id
        "#,
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
}

pub async fn ingredients_for(
    db: &PgPool,
    recipe_ids: &[i64],
) -> Result<Vec<IngredientLineRow>, sqlx::Error> {
    sqlx::query_as::<_, IngredientLineRow>(
        r#"
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
          FROM recipe_ingredients ri
          JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE ri.recipe_id = ANY($1)
         ORDER BY ri.id
        "#,
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
}

pub async fn ownership(db: &PgPool, id: i64) -> Result<Option<Ownership>, sqlx::Error> {
    sqlx::query_as::<_, Ownership>("SELECT author_id, image FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn exists(db: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM recipes WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    author_id: i64,
    recipe: &ValidRecipe,
    image_key: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(image_key)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut **tx)
    .await
}

/// Updates the scalar columns; `image_key` of `None` keeps the stored image.
/// Returns false when the recipe no longer exists.
pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    recipe: &ValidRecipe,
    image_key: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE recipes
           SET name = $2, text = $3, cooking_time = $4, image = COALESCE($5, image)
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(image_key)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Clears the recipe's tag set and attaches `tag_ids`.
pub async fn replace_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    tag_ids: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        "INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::BIGINT[])",
    )
    .bind(recipe_id)
    .bind(tag_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Deletes every ingredient line of the recipe and recreates them from the parallel slices.
pub async fn replace_ingredients_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    ingredient_ids: &[i64],
    amounts: &[i32],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, line.ingredient_id, line.amount
          FROM UNNEST($2::BIGINT[], $3::INTEGER[]) WITH ORDINALITY
               AS line(ingredient_id, amount, position)
         ORDER BY line.position
        "#,
    )
    .bind(recipe_id)
    .bind(ingredient_ids)
    .bind(amounts)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Rows in favorites, shopping_cart, recipe_tags and recipe_ingredients go with it (cascade).
pub async fn delete(db: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn short(db: &PgPool, id: i64) -> Result<Option<ShortRecipeRow>, sqlx::Error> {
    sqlx::query_as::<_, ShortRecipeRow>(
        "SELECT id, author_id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Newest recipes of each author, at most `per_author` each when given.
pub async fn short_by_authors(
    db: &PgPool,
    author_ids: &[i64],
    per_author: Option<i64>,
) -> Result<Vec<ShortRecipeRow>, sqlx::Error> {
    sqlx::query_as::<_, ShortRecipeRow>(
        r#"
        SELECT id, author_id, name, image, cooking_time
          FROM (
                SELECT r.id, r.author_id, r.name, r.image, r.cooking_time,
                       ROW_NUMBER() OVER (PARTITION BY r.author_id
                                          ORDER BY r.pub_date DESC, r.id DESC) AS rn
                  FROM recipes r
                 WHERE r.author_id = ANY($1)
               ) ranked
         WHERE $2::BIGINT IS NULL OR rn <= $2
         ORDER BY author_id, rn
        "#,
    )
    .bind(author_ids)
    .bind(per_author)
    .fetch_all(db)
    .await
}

/// One row per ingredient line of every recipe in the user's shopping cart, in collation
/// order of ingredient name, then unit.
pub async fn cart_lines(db: &PgPool, user_id: i64) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as::<_, CartLine>(
        r#"
        SELECT i.name, i.measurement_unit, ri.amount::BIGINT AS amount
          FROM shopping_cart sc
          JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
          JOIN ingredients i ON i.id = ri.ingredient_id
         WHERE sc.user_id = $1
         ORDER BY i.name, i.measurement_unit
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
}
