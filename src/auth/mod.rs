use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub mod extractors;
pub mod firebase;
pub mod handlers;
pub mod jwt;
mod repo;
pub mod repo_types;
pub mod verifier;

/// Put every route of `routes` behind `require_auth`.
pub fn protect(routes: Router<AppState>, state: &AppState) -> Router<AppState> {
    routes.route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        extractors::require_auth,
    ))
}

/// Registration and login stay public; everything else needs a token.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_routes())
        .merge(protect(handlers::protected_routes(), state))
}
