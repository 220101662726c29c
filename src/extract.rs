//! `Json`, `Query` and `Path` extractors whose rejections render through [`AppError`].

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{AppError, ValidationError};

pub struct ApiJson<T>(pub T);

pub struct ApiQuery<T>(pub T);

pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(error = %rejection.body_text(), "request body rejected");
                Err(ValidationError::field("body", rejection.body_text()).into())
            }
        }
    }
}

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ValidationError::field("query", rejection.body_text()).into()),
        }
    }
}

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(ValidationError::field("path", rejection.body_text()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode, routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Deserialize)]
    struct Amount {
        amount: i64,
    }

    #[derive(Deserialize)]
    struct Limit {
        #[allow(dead_code)]
        recipes_limit: Option<u32>,
    }

    async fn echo(
        ApiPath(id): ApiPath<i64>,
        ApiQuery(_limit): ApiQuery<Limit>,
        ApiJson(body): ApiJson<Amount>,
    ) -> String {
        format!("{id}:{}", body.amount)
    }

    fn app() -> Router {
        Router::new().route("/items/:id", post(echo))
    }

    async fn send(uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let res = app()
            .oneshot(
                axum::http::Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn well_formed_request_passes() {
        let res = app()
            .oneshot(
                axum::http::Request::post("/items/3?recipes_limit=2")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"amount": 5}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bad_body_renders_errors_json() {
        let (status, json) = send("/items/3", r#"{"amount": "x"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"].as_str().unwrap().starts_with("body:"));
    }

    #[tokio::test]
    async fn negative_limit_renders_errors_json() {
        let (status, json) = send("/items/3?recipes_limit=-1", r#"{"amount": 5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"].as_str().unwrap().starts_with("query:"));
    }

    #[tokio::test]
    async fn non_numeric_id_renders_errors_json() {
        let (status, json) = send("/items/abc", r#"{"amount": 5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"].as_str().unwrap().starts_with("path:"));
    }
}
