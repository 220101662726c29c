use axum::{
    extract::{DefaultBodyLimit, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, info, instrument};

use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    pagination::Page,
    recipes::{
        dto::{RecipeListQuery, RecipeRead, RecipeShort, RecipeWrite},
        repo, services, shopping,
    },
    relations::{self, Relationship},
    state::AppState,
};

// Images arrive inline as base64.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/recipes/:id",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    ApiQuery(query): ApiQuery<RecipeListQuery>,
) -> AppResult<Json<Page<RecipeRead>>> {
    Ok(Json(services::list(&state, viewer, &query).await?))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<RecipeRead>> {
    Ok(Json(services::read(&state, viewer, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(body): ApiJson<RecipeWrite>,
) -> AppResult<(StatusCode, Json<RecipeRead>)> {
    let recipe = services::create(&state, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip(state, body))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<RecipeWrite>,
) -> AppResult<Json<RecipeRead>> {
    Ok(Json(services::update(&state, user_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    services::delete(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_relation(
    state: &AppState,
    relationship: Relationship,
    user_id: i64,
    recipe_id: i64,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    relations::add(&state.db, relationship, user_id, recipe_id).await?;
    let short = services::short(state, recipe_id).await?;
    Ok((StatusCode::CREATED, Json(short)))
}

async fn remove_relation(
    state: &AppState,
    relationship: Relationship,
    user_id: i64,
    recipe_id: i64,
) -> AppResult<StatusCode> {
    if !repo::exists(&state.db, recipe_id).await? {
        return Err(AppError::NotFound("recipe"));
    }
    relations::remove(&state.db, relationship, user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    add_relation(&state, Relationship::Favorite, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    remove_relation(&state, Relationship::Favorite, user_id, id).await
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    add_relation(&state, Relationship::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    remove_relation(&state, Relationship::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<impl IntoResponse> {
    let list = shopping::for_user(&state.db, user_id).await?;
    if list.is_empty() {
        debug!(user_id, "shopping cart is empty");
    }
    info!(user_id, groups = list.len(), "shopping list rendered");
    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_cart.txt\"",
            ),
        ],
        list.render(),
    ))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, extract::FromRef, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::jwt::JwtKeys;

    fn bearer(state: &AppState, user_id: i64) -> String {
        let token = JwtKeys::from_ref(state).sign_access(user_id).unwrap();
        format!("Bearer {token}")
    }

    #[tokio::test]
    async fn zero_amount_is_rejected_before_the_store() {
        let state = AppState::fake();
        let auth = bearer(&state, 1);
        let app = crate::app::build_app(state);
        let body = serde_json::json!({
            "ingredients": [{"id": 1, "amount": 0}],
            "tags": [1],
            "image": "data:image/png;base64,iVBORw0KGgo=",
            "name": "Tea",
            "text": "Steep it",
            "cooking_time": 3
        });
        let res = app
            .oneshot(
                Request::post("/api/recipes")
                    .header("content-type", "application/json")
                    .header("authorization", auth)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json["errors"],
            "ingredient amount must be greater than zero"
        );
    }

    #[tokio::test]
    async fn shopping_list_download_requires_a_token() {
        let app = crate::app::build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::get("/api/recipes/download_shopping_cart")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn anonymous_cannot_favorite() {
        let app = crate::app::build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/api/recipes/3/favorite")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
