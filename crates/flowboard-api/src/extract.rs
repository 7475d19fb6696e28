use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use flowboard_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated caller, extracted from the `Authorization` header.
/// Missing, malformed, tampered, and expired tokens all reject with the
/// same 401 envelope.
pub struct AuthUser(pub Claims);

/// Caller identity when a valid bearer token is present; anonymous
/// otherwise. An invalid token is treated as anonymous, never an error.
pub struct MaybeAuthUser(pub Option<Claims>);

fn bearer_claims(parts: &Parts, state: &AppState) -> Option<Claims> {
    let header_value = parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;

    // "Bearer <token>" or a bare token.
    let token = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    state.signer.resolve(token).ok()
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        bearer_claims(parts, state)
            .map(AuthUser)
            .ok_or(ApiError::Unauthenticated)
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(bearer_claims(parts, state)))
    }
}
