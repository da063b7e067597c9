pub mod dto;
pub mod handlers;
pub mod push;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    crate::auth::protect(handlers::routes(), state)
}
