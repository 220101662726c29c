pub mod dto;
mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod shopping;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::recipe_routes()
}
