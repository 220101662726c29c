use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, RefreshRequest, RegisterRequest, RegisteredUser, SetPasswordRequest,
            TokenPair,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo_types::{NewUser, User},
        services::{validate_password, validate_registration},
    },
    error::{AppError, AppResult},
    extract::ApiJson,
    state::AppState,
    users::dto::Profile,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/token/login", post(login))
        .route("/auth/token/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me))
        .route("/users/set_password", post(set_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisteredUser>)> {
    if let Err(e) = validate_registration(&mut payload) {
        warn!(error = %e, "registration rejected");
        return Err(e.into());
    }

    let hash = hash_password(&payload.password)?;
    // Email and username uniqueness is enforced by the users table constraints.
    let user = User::create(
        &state.db,
        NewUser {
            email: &payload.email,
            username: &payload.username,
            first_name: &payload.first_name,
            last_name: &payload.last_name,
            password_hash: &hash,
        },
    )
    .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let email = payload.email.trim().to_lowercase();
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid());
    }

    let pair = issue_pair(&JwtKeys::from_ref(&state), user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    if User::find_by_id(&state.db, claims.sub).await?.is_none() {
        return Err(AppError::Unauthorized("User not found".into()));
    }

    Ok(Json(issue_pair(&keys, claims.sub)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Profile>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(Profile::from_user(user, false)))
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    validate_password(&payload.new_password)?;

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(crate::error::ValidationError::field(
            "current_password",
            "incorrect password",
        )
        .into());
    }

    let hash = hash_password(&payload.new_password)?;
    User::set_password_hash(&state.db, user_id, &hash).await?;
    info!(user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

fn issue_pair(keys: &JwtKeys, user_id: i64) -> anyhow::Result<TokenPair> {
    Ok(TokenPair {
        access_token: keys.sign_access(user_id)?,
        refresh_token: keys.sign_refresh(user_id)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn me_requires_a_token() {
        let app = crate::app::build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/users/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn registration_with_reserved_username_never_reaches_the_store() {
        let app = crate::app::build_app(AppState::fake());
        let body = serde_json::json!({
            "email": "me@example.com",
            "username": "me",
            "first_name": "Me",
            "last_name": "Myself",
            "password": "long-enough"
        });
        let res = app
            .oneshot(
                Request::post("/api/users")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn issued_pair_verifies() {
        let keys = JwtKeys::from_config(&crate::state::fake_config().jwt);
        let pair = issue_pair(&keys, 5).unwrap();
        assert_eq!(keys.verify(&pair.access_token).unwrap().sub, 5);
        assert_eq!(keys.verify_refresh(&pair.refresh_token).unwrap().sub, 5);
    }
}
