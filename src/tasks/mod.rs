mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

use crate::{auth::middleware::require_auth, state::AppState};
use axum::{middleware::from_fn_with_state, Router};

/// Every task route sits behind [`require_auth`].
pub fn router(state: AppState) -> Router<AppState> {
    handlers::task_routes().route_layer(from_fn_with_state(state, require_auth))
}
