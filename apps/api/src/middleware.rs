use std::str::FromStr;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use corkboard_core::{AppError, AppResult, Principal, UserId};

use crate::error::ApiResult;
use crate::state::AppState;

/// Attaches the authenticated principal from the gateway identity headers.
///
/// Credential validation happens upstream; by the time a request reaches this
/// service the gateway has already authenticated it and stamped the identity
/// headers, which are stripped from anything arriving from outside.
pub async fn require_auth(mut request: Request, next: Next) -> ApiResult<Response> {
    let principal = principal_from_headers(request.headers())?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Guards the internal ingest surface with the shared worker secret.
pub async fn require_internal_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let presented = request
        .headers()
        .get("x-internal-secret")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if presented.is_empty() || presented != state.internal_shared_secret {
        return Err(AppError::Unauthorized("invalid internal secret".to_owned()).into());
    }

    Ok(next.run(request).await)
}

fn principal_from_headers(headers: &HeaderMap) -> AppResult<Principal> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
    let user_id = UserId::from_str(user_id)
        .map_err(|_| AppError::Unauthorized("malformed identity header".to_owned()))?;

    let is_global_admin = headers
        .get("x-global-admin")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"));

    Ok(Principal::new(user_id, is_global_admin))
}
