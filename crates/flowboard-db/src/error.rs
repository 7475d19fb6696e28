use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Which daily quota a rate-limited action was counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Requests,
    Votes,
}

#[derive(Debug, Error)]
pub enum DbError {
    /// Input rejected by the ledger's own validation. The message is
    /// user-facing.
    #[error("{0}")]
    InvalidInput(String),

    /// Token row does not exist: never issued, or already consumed.
    /// Callers must not distinguish the two cases outward.
    #[error("magic token invalid")]
    TokenInvalid,

    #[error("magic token expired")]
    TokenExpired,

    #[error("not found")]
    NotFound,

    #[error("quota exhausted: {count}/{limit}")]
    RateLimited {
        kind: QuotaKind,
        count: i64,
        limit: i64,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection lock poisoned: {0}")]
    Lock(String),
}
