use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::relations::Relationship;

/// Client-side mistakes. Every variant renders as a 400.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}", .0.duplicate_message())]
    DuplicateRelationship(Relationship),
    #[error("you cannot subscribe to yourself")]
    SelfReferenceNotAllowed,
    #[error("{}", .0.missing_message())]
    RelationshipNotFound(Relationship),
    #[error("ingredient amount must be greater than zero")]
    InvalidQuantity,
    #[error("cooking time must be at least 1 minute")]
    InvalidCookingTime,
    #[error("ingredient {0} is listed more than once")]
    DuplicateIngredient(i64),
    #[error("unknown {0}")]
    UnknownReference(&'static str),
    #[error("{field}: {message}")]
    Field {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Field {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(String),

    #[error("you do not have permission to perform this action")]
    Forbidden,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    errors: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(e) = &self {
            error!(error = ?e, "request failed");
        }
        let body = ErrorBody {
            errors: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = e {
            return AppError::NotFound("object");
        }
        if let Some(mapped) = e
            .as_database_error()
            .and_then(|db| db.constraint())
            .and_then(from_constraint)
        {
            return mapped;
        }
        AppError::Internal(e.into())
    }
}

/// Translates a violated schema constraint into the error a request-time check would have
/// produced. Names follow `migrations/0001_init.sql` and Postgres' `<table>_<column>_fkey`.
fn from_constraint(name: &str) -> Option<AppError> {
    use ValidationError as V;

    let err: AppError = match name {
        "favorites_user_recipe_key" => V::DuplicateRelationship(Relationship::Favorite).into(),
        "shopping_cart_user_recipe_key" => {
            V::DuplicateRelationship(Relationship::ShoppingCart).into()
        }
        "subscriptions_user_author_key" => {
            V::DuplicateRelationship(Relationship::Subscription).into()
        }
        "subscriptions_no_self" => V::SelfReferenceNotAllowed.into(),
        "users_email_key" => V::field("email", "a user with that email already exists").into(),
        "users_username_key" => {
            V::field("username", "a user with that username already exists").into()
        }
        "users_username_not_reserved" => V::field("username", "this username is reserved").into(),
        "tags_slug_key" => V::field("slug", "a tag with that slug already exists").into(),
        "tags_color_hex" => V::field("color", "expected a #RRGGBB hex color").into(),
        "recipes_cooking_time_check" => V::InvalidCookingTime.into(),
        "recipe_ingredients_amount_check" => V::InvalidQuantity.into(),
        "recipe_ingredients_ingredient_id_fkey" => V::UnknownReference("ingredient").into(),
        "recipe_tags_tag_id_fkey" => V::UnknownReference("tag").into(),
        "favorites_recipe_id_fkey"
        | "shopping_cart_recipe_id_fkey"
        | "recipe_tags_recipe_id_fkey"
        | "recipe_ingredients_recipe_id_fkey" => AppError::NotFound("recipe"),
        "subscriptions_author_id_fkey" | "recipes_author_id_fkey" => AppError::NotFound("user"),
        _ => return None,
    };
    Some(err)
}
