use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        extractors::{AuthUser, MaybeAuthUser},
        handlers::register,
    },
    error::{AppError, AppResult},
    extract::{ApiPath, ApiQuery},
    pagination::{Page, PageParams},
    state::AppState,
    users::{
        dto::{Profile, RecipesLimit, Subscription, SubscriptionsQuery},
        repo, services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(register))
        .route("/users/subscriptions", get(list_subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<Json<Page<Profile>>> {
    let (limit, offset) = page.resolve(state.config.page_size);
    let (results, count) = repo::list(&state.db, viewer, limit, offset).await?;
    Ok(Json(Page { count, results }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Profile>> {
    repo::find(&state.db, viewer, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("user"))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(author_id): ApiPath<i64>,
    ApiQuery(limit): ApiQuery<RecipesLimit>,
) -> AppResult<(StatusCode, Json<Subscription>)> {
    let sub = services::subscribe(&state, user_id, author_id, limit.recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(author_id): ApiPath<i64>,
) -> AppResult<StatusCode> {
    services::unsubscribe(&state, user_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(query): ApiQuery<SubscriptionsQuery>,
) -> AppResult<Json<Page<Subscription>>> {
    Ok(Json(services::subscriptions(&state, user_id, &query).await?))
}
