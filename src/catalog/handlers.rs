use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    catalog::{
        dto::{Ingredient, IngredientSearch, Tag},
        repo,
        services::prefix_pattern,
    },
    error::{AppError, AppResult},
    extract::{ApiPath, ApiQuery},
    state::AppState,
};

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
        .route("/tags", get(list_tags))
        .route("/tags/:id", get(get_tag))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    ApiQuery(search): ApiQuery<IngredientSearch>,
) -> AppResult<Json<Vec<Ingredient>>> {
    let pattern = search.name.as_deref().map(prefix_pattern);
    Ok(Json(
        repo::search_ingredients(&state.db, pattern.as_deref()).await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Ingredient>> {
    repo::find_ingredient(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("ingredient"))
}

#[instrument(skip(state))]
pub async fn list_tags(State(state): State<AppState>) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(repo::list_tags(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_tag(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> AppResult<Json<Tag>> {
    repo::find_tag(&state.db, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("tag"))
}
