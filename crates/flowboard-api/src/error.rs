use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use flowboard_db::error::{DbError, QuotaKind};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Handler-level error. Every variant renders as the
/// `{"success": false, "error": "<message>"}` envelope; the message is
/// the user-facing text, so raw store detail never leaks to clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("请先登录")]
    Unauthenticated,

    /// Magic token rejected. Covers never-issued, already-used, and
    /// expired alike so callers cannot enumerate tokens.
    #[error("验证码无效或已过期")]
    TokenRejected,

    #[error("需求不存在")]
    NotFound,

    #[error("您今天已创建 {count} 个需求，已达每日限额（{limit}个）")]
    RequestQuota { count: i64, limit: i64 },

    #[error("您今天已投票 {count} 次，已达每日限额（{limit}次）")]
    VoteQuota { count: i64, limit: i64 },

    #[error("邮件发送失败，请稍后重试")]
    EmailSendFailed,

    #[error("服务器错误，请稍后重试")]
    Store(#[source] DbError),

    #[error("服务器错误，请稍后重试")]
    Internal(#[source] anyhow::Error),
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::InvalidInput(msg) => ApiError::Validation(msg),
            DbError::TokenInvalid | DbError::TokenExpired => ApiError::TokenRejected,
            DbError::NotFound => ApiError::NotFound,
            DbError::RateLimited {
                kind: QuotaKind::Requests,
                count,
                limit,
            } => ApiError::RequestQuota { count, limit },
            DbError::RateLimited {
                kind: QuotaKind::Votes,
                count,
                limit,
            } => ApiError::VoteQuota { count, limit },
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::TokenRejected => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::RequestQuota { .. } | ApiError::VoteQuota { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::EmailSendFailed => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Full detail stays server-side.
        match &self {
            ApiError::Store(source) => error!("store failure: {source}"),
            ApiError::Internal(source) => error!("internal error: {source:#}"),
            _ => {}
        }

        (
            status,
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failures_collapse_to_one_message() {
        let invalid = ApiError::from(DbError::TokenInvalid).to_string();
        let expired = ApiError::from(DbError::TokenExpired).to_string();
        assert_eq!(invalid, expired);
    }

    #[test]
    fn quota_messages_carry_count_and_limit() {
        let e = ApiError::from(DbError::RateLimited {
            kind: QuotaKind::Requests,
            count: 3,
            limit: 3,
        });
        let msg = e.to_string();
        assert!(msg.contains('3'));
        assert!(matches!(e, ApiError::RequestQuota { .. }));

        let e = ApiError::from(DbError::RateLimited {
            kind: QuotaKind::Votes,
            count: 20,
            limit: 20,
        });
        assert!(matches!(e, ApiError::VoteQuota { .. }));
        assert!(e.to_string().contains("20"));
    }

    #[test]
    fn store_failures_hide_detail() {
        let e = ApiError::Store(DbError::Lock("poisoned".into()));
        assert!(!e.to_string().contains("poisoned"));
    }
}
