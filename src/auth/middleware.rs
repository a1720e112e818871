//! Authentication middleware
//!
//! Extracts and validates JWT tokens from requests.

use crate::auth::{Claims, Permission};
use crate::error::AppError;
use crate::state::SharedState;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Extract claims from request
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?;

    let claims = state.jwt.decode_access_token(token)?;

    // Insert claims into request extensions for handlers to use
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Require a permission before doing anything else in a handler
pub fn require_permission(claims: &Claims, required: Permission) -> Result<(), AppError> {
    if !claims.role.has_permission(required) {
        return Err(AppError::Forbidden(format!(
            "Requires permission to {}, you are {}",
            required, claims.role
        )));
    }

    Ok(())
}
