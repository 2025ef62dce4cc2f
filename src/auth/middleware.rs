use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{errors::ApiError, state::AppState};

/// Extracts the token from `Authorization: Bearer <token>`.
///
/// No header at all is [`ApiError::MissingToken`]; a header that is present
/// but not exactly a bearer scheme followed by one token is
/// [`ApiError::InvalidToken`].
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(ApiError::MissingToken)?
        .to_str()
        .map_err(|_| ApiError::InvalidToken)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(ApiError::InvalidToken),
    }
}

/// Rejects the request with 401/403 or attaches the verified
/// [`Principal`](crate::auth::claims::Principal) to its extensions.
///
/// ```ignore
/// Router::new()
///     .route("/tasks", get(list_tasks))
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = match bearer_token(request.headers()) {
        Ok(token) => state.auth.keys().verify(token)?,
        Err(e) => {
            warn!(error = %e, uri = %request.uri(), "rejected request");
            return Err(e);
        }
    };
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
