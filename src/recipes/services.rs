use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult, ValidationError},
    images::{decode_data_uri, store_recipe_image},
    pagination::Page,
    recipes::{
        dto::{IngredientLine, RecipeListQuery, RecipeRead, RecipeShort, RecipeWrite, ValidRecipe},
        repo,
        repo_types::{RecipeRow, ShortRecipeRow},
    },
    state::AppState,
    storage::StorageClient,
    users::dto::Profile,
};

const MAX_NAME_LEN: usize = 200;

/// Checks a submitted recipe without touching the store. `require_image` is set on create.
pub fn validate(body: RecipeWrite, require_image: bool) -> Result<ValidRecipe, ValidationError> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::field("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::field(
            "name",
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }

    let text = body.text.trim().to_string();
    if text.is_empty() {
        return Err(ValidationError::field("text", "must not be empty"));
    }

    if body.cooking_time < 1 {
        return Err(ValidationError::InvalidCookingTime);
    }
    let cooking_time = i32::try_from(body.cooking_time)
        .map_err(|_| ValidationError::field("cooking_time", "is too large"))?;

    if body.ingredients.is_empty() {
        return Err(ValidationError::field(
            "ingredients",
            "at least one ingredient is required",
        ));
    }
    let mut seen = HashSet::new();
    let mut ingredient_ids = Vec::with_capacity(body.ingredients.len());
    let mut amounts = Vec::with_capacity(body.ingredients.len());
    for item in &body.ingredients {
        if item.amount <= 0 {
            return Err(ValidationError::InvalidQuantity);
        }
        if !seen.insert(item.id) {
            return Err(ValidationError::DuplicateIngredient(item.id));
        }
        let amount = i32::try_from(item.amount)
            .map_err(|_| ValidationError::field("amount", "is too large"))?;
        ingredient_ids.push(item.id);
        amounts.push(amount);
    }

    // Repeated tag ids collapse into one; first occurrence keeps its position.
    let mut seen_tags = HashSet::new();
    let tag_ids = body
        .tags
        .into_iter()
        .filter(|id| seen_tags.insert(*id))
        .collect();

    let image = match body.image.as_deref().map(str::trim) {
        Some(data) if !data.is_empty() => Some(decode_data_uri(data)?),
        _ if require_image => return Err(ValidationError::field("image", "is required")),
        _ => None,
    };

    Ok(ValidRecipe {
        name,
        text,
        cooking_time,
        tag_ids,
        ingredient_ids,
        amounts,
        image,
    })
}

pub async fn create(state: &AppState, author_id: i64, body: RecipeWrite) -> AppResult<RecipeRead> {
    let mut recipe = validate(body, true)?;
    let image = recipe
        .image
        .take()
        .ok_or_else(|| ValidationError::field("image", "is required"))?;

    let key = store_recipe_image(state.storage.as_ref(), image).await?;
    let id = match insert_recipe(state, author_id, &recipe, &key).await {
        Ok(id) => id,
        Err(e) => {
            discard_image(state.storage.as_ref(), &key).await;
            return Err(e);
        }
    };

    info!(recipe_id = id, author_id, "recipe created");
    read(state, Some(author_id), id).await
}

async fn insert_recipe(
    state: &AppState,
    author_id: i64,
    recipe: &ValidRecipe,
    image_key: &str,
) -> AppResult<i64> {
    let mut tx = state.db.begin().await?;
    let id = repo::insert_tx(&mut tx, author_id, recipe, image_key).await?;
    repo::replace_tags_tx(&mut tx, id, &recipe.tag_ids).await?;
    repo::replace_ingredients_tx(&mut tx, id, &recipe.ingredient_ids, &recipe.amounts).await?;
    tx.commit().await?;
    Ok(id)
}

/// Replaces every field of the recipe. Tags and ingredient lines are rebuilt from scratch;
/// the image is kept unless a new one is sent.
pub async fn update(
    state: &AppState,
    user_id: i64,
    recipe_id: i64,
    body: RecipeWrite,
) -> AppResult<RecipeRead> {
    let mut recipe = validate(body, false)?;

    let owner = repo::ownership(&state.db, recipe_id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    ensure_can_modify(state, user_id, owner.author_id).await?;

    let new_key = match recipe.image.take() {
        Some(image) => Some(store_recipe_image(state.storage.as_ref(), image).await?),
        None => None,
    };

    if let Err(e) = rewrite_recipe(state, recipe_id, &recipe, new_key.as_deref()).await {
        if let Some(key) = &new_key {
            discard_image(state.storage.as_ref(), key).await;
        }
        return Err(e);
    }
    if new_key.is_some() {
        discard_image(state.storage.as_ref(), &owner.image).await;
    }

    info!(recipe_id, user_id, "recipe updated");
    read(state, Some(user_id), recipe_id).await
}

async fn rewrite_recipe(
    state: &AppState,
    recipe_id: i64,
    recipe: &ValidRecipe,
    image_key: Option<&str>,
) -> AppResult<()> {
    let mut tx = state.db.begin().await?;
    if !repo::update_tx(&mut tx, recipe_id, recipe, image_key).await? {
        return Err(AppError::NotFound("recipe"));
    }
    repo::replace_tags_tx(&mut tx, recipe_id, &recipe.tag_ids).await?;
    repo::replace_ingredients_tx(&mut tx, recipe_id, &recipe.ingredient_ids, &recipe.amounts)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn delete(state: &AppState, user_id: i64, recipe_id: i64) -> AppResult<()> {
    let owner = repo::ownership(&state.db, recipe_id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    ensure_can_modify(state, user_id, owner.author_id).await?;

    if !repo::delete(&state.db, recipe_id).await? {
        return Err(AppError::NotFound("recipe"));
    }
    discard_image(state.storage.as_ref(), &owner.image).await;

    info!(recipe_id, user_id, "recipe deleted");
    Ok(())
}

/// Authors may change their own recipes; admins may change any.
async fn ensure_can_modify(state: &AppState, user_id: i64, author_id: i64) -> AppResult<()> {
    if user_id == author_id {
        return Ok(());
    }
    let is_admin = User::find_by_id(&state.db, user_id)
        .await?
        .is_some_and(|u| u.is_admin);
    if is_admin {
        Ok(())
    } else {
        warn!(user_id, author_id, "recipe change by non-author refused");
        Err(AppError::Forbidden)
    }
}

async fn discard_image(storage: &dyn StorageClient, key: &str) {
    if let Err(e) = storage.delete_object(key).await {
        warn!(error = ?e, key, "failed to delete recipe image");
    }
}

pub async fn read(state: &AppState, viewer: Option<i64>, recipe_id: i64) -> AppResult<RecipeRead> {
    let row = repo::find(&state.db, viewer, recipe_id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    assemble(state, vec![row])
        .await?
        .pop()
        .ok_or(AppError::NotFound("recipe"))
}

pub async fn list(
    state: &AppState,
    viewer: Option<i64>,
    query: &RecipeListQuery,
) -> AppResult<Page<RecipeRead>> {
    let (limit, offset) = query.page_params().resolve(state.config.page_size);
    let (rows, count) = repo::list(&state.db, viewer, &query.filter(), limit, offset).await?;
    Ok(Page {
        count,
        results: assemble(state, rows).await?,
    })
}

/// Attaches tags and ingredient lines to each row with one query per relation.
async fn assemble(state: &AppState, rows: Vec<RecipeRow>) -> AppResult<Vec<RecipeRead>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let mut tags: HashMap<i64, Vec<_>> = HashMap::new();
    for row in repo::tags_for(&state.db, &ids).await? {
        tags.entry(row.recipe_id).or_default().push(row.tag);
    }
    let mut lines: HashMap<i64, Vec<IngredientLine>> = HashMap::new();
    for row in repo::ingredients_for(&state.db, &ids).await? {
        lines.entry(row.recipe_id).or_default().push(IngredientLine {
            id: row.id,
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        });
    }

    Ok(rows
        .into_iter()
        .map(|r| RecipeRead {
            id: r.id,
            tags: tags.remove(&r.id).unwrap_or_default(),
            author: Profile {
                email: r.author_email,
                id: r.author_id,
                username: r.author_username,
                first_name: r.author_first_name,
                last_name: r.author_last_name,
                is_subscribed: r.author_is_subscribed,
            },
            ingredients: lines.remove(&r.id).unwrap_or_default(),
            is_favorited: r.is_favorited,
            is_in_shopping_cart: r.is_in_shopping_cart,
            name: r.name,
            image: state.storage.object_url(&r.image),
            text: r.text,
            cooking_time: r.cooking_time,
        })
        .collect())
}

pub fn short_from_row(storage: &dyn StorageClient, row: ShortRecipeRow) -> RecipeShort {
    RecipeShort {
        id: row.id,
        name: row.name,
        image: storage.object_url(&row.image),
        cooking_time: row.cooking_time,
    }
}

pub async fn short(state: &AppState, recipe_id: i64) -> AppResult<RecipeShort> {
    let row = repo::short(&state.db, recipe_id)
        .await?
        .ok_or(AppError::NotFound("recipe"))?;
    Ok(short_from_row(state.storage.as_ref(), row))
}
