//! Database row types — these map directly to SQLite rows.
//! All timestamps are integer Unix milliseconds.

use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub created_at: i64,
    pub last_login: i64,
}

/// Lifecycle of a feature request. Transitions are administrative and
/// happen outside the HTTP surface; no endpoint mutates status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "in_progress" => Ok(RequestStatus::InProgress),
            "completed" => Ok(RequestStatus::Completed),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(()),
        }
    }
}

impl ToSql for RequestStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RequestStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

/// Status filter for listings: `All` disables the filter entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(RequestStatus),
}

/// Listing order. Ties always break on primary key ascending so
/// pagination stays stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Votes,
    Created,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub user_id: i64,
    pub status: RequestStatus,
    pub vote_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A request joined with its owner's (masked) email and the viewing
/// user's vote state. This is the listing shape the API serves.
#[derive(Debug, Clone, Serialize)]
pub struct RequestWithUser {
    #[serde(flatten)]
    pub request: RequestRow,
    pub user_email: String,
    pub has_voted: bool,
}

/// Post-toggle vote state for one request.
#[derive(Debug, Clone, Copy)]
pub struct VoteState {
    pub vote_count: i64,
    pub has_voted: bool,
}

/// Result of a pure quota check; `count` is actions inside the trailing
/// 24-hour window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub allowed: bool,
    pub count: i64,
    pub limit: i64,
}
