use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use bazaar_core::Principal;

use crate::auth::decode_token;
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Authentication Middleware
// ============================================================================

/// Resolves the caller from a Bearer token, falling back to the session
/// cookie, and stores the `Principal` in the request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned);

    let token = bearer
        .or_else(|| jar.get(&state.auth.cookie_name).map(|c| c.value().to_owned()))
        .ok_or_else(|| AppError::AuthenticationError("Not authorized, no token".to_string()))?;

    let principal = decode_token(&state.auth.secret, &token)?.into_principal()?;
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

// ============================================================================
// Extractors
// ============================================================================

/// The authenticated caller. Only valid behind `authenticate`.
pub struct CurrentUser(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::AuthenticationError("User not authenticated".to_string()))
    }
}

/// An authenticated caller carrying the admin flag; anyone else gets 403.
pub struct AdminUser(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(principal) = CurrentUser::from_request_parts(parts, state).await?;
        principal.ensure_admin().map_err(|e| {
            tracing::warn!(user_id = %principal.id, error = %e, "Admin route refused");
            AppError::AuthorizationError("Not authorized as an admin".to_string())
        })?;
        Ok(AdminUser(principal))
    }
}
