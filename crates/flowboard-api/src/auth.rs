use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::{info, warn};

use flowboard_types::api::{
    LoginRequest, LoginResponse, MeResponse, UserInfo, VerifyRequest, VerifyResponse,
};

use crate::email;
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

/// POST /api/auth/login — issue a magic token and mail the link. A send
/// failure is terminal: the token stays unused and the user retries.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email_addr = req.email.trim();
    if email_addr.is_empty() {
        return Err(ApiError::Validation("邮箱地址不能为空".into()));
    }
    if !email::is_valid_email(email_addr) {
        return Err(ApiError::Validation("邮箱格式不正确".into()));
    }

    let token = state
        .db
        .create_magic_token(email_addr, Utc::now().timestamp_millis())?;

    let (subject, html) = email::magic_link_email(&token, &state.public_url);
    if !state.mailer.send(email_addr, &subject, &html) {
        warn!("Failed to send magic link to {}", email_addr);
        return Err(ApiError::EmailSendFailed);
    }

    info!("Magic link sent to {}", email_addr);
    Ok(Json(LoginResponse {
        success: true,
        message: "验证邮件已发送，请查收".into(),
        token: state.dev_mode.then_some(token),
    }))
}

/// POST /api/auth/verify — consume the magic token, upsert the user,
/// and hand back a signed session token.
pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(ApiError::Validation("验证码不能为空".into()));
    }

    let now_ms = Utc::now().timestamp_millis();
    let email_addr = state.db.verify_magic_token(token, now_ms).map_err(|e| {
        warn!("Magic token rejected: {e}");
        ApiError::from(e)
    })?;

    let user = state.db.get_or_create_user(&email_addr, now_ms)?;
    let session_token = state
        .signer
        .issue(user.id, &user.email)
        .map_err(ApiError::Internal)?;

    info!("User {} logged in", user.email);
    Ok(Json(VerifyResponse {
        success: true,
        user: UserInfo {
            id: user.id,
            email: user.email,
        },
        session_token,
    }))
}

/// GET /api/auth/me — identify the caller from their session token.
pub async fn me(AuthUser(claims): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user: UserInfo {
            id: claims.sub,
            email: claims.email,
        },
    })
}
