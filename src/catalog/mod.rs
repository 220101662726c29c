pub mod dto;
mod handlers;
pub mod import;
pub mod repo;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::catalog_routes()
}
