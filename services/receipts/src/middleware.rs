//! Authentication middleware and clearance guards
//!
//! Authentication always runs before any role check: the middleware
//! validates the bearer token and loads the account; handlers then assert
//! the required capability at their top. An account flagged for a password
//! change may only reach the change-password route.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{Clearance, User};
use crate::state::AppState;

/// Route exempt from the password-change gate
const CHANGE_PASSWORD_PATH: &str = "/auth/change_password";

/// Authentication middleware
///
/// Validates the bearer token, re-reads the account from the database, and
/// inserts it into the request extensions for handlers to pick up.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let claims = state.jwt.validate_token(token)?;

    // The account is re-read so deletions and role revocations take effect
    // on the next request, not at token expiry.
    let user = state
        .directory
        .get_user(claims.sub)
        .await
        .map_err(missing_user_as_unauthorized)?;

    if user.needs_password_change && req.uri().path() != CHANGE_PASSWORD_PATH {
        let body = Json(json!({
            "error": "Password change required",
        }));
        return Ok((StatusCode::FORBIDDEN, body).into_response());
    }

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// A token for a deleted account reads as an auth failure; database
/// failures stay server errors
fn missing_user_as_unauthorized(err: AppError) -> AppError {
    match err {
        AppError::NotFound(_) => AppError::Unauthorized,
        other => other,
    }
}

/// Assert that the acting user holds a capability
pub fn require_clearance(user: &User, capability: Clearance) -> AppResult<()> {
    if user.clearance.contains(capability) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}
