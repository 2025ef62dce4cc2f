use crate::state::AppState;
use axum::{middleware::from_fn_with_state, Router};

pub mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(
            handlers::me_routes()
                .route_layer(from_fn_with_state(state, middleware::require_auth)),
        )
}
