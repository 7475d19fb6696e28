//! Magic-link tokens: single-use, time-limited login credentials.
//!
//! Consumption is a single `DELETE ... RETURNING` statement, so testing
//! and deleting a token is one atomic step: of two concurrent
//! verifications, exactly one sees the row. The expiry check happens
//! after the delete — an expired token is consumed on detection, same
//! as a valid one.

use rusqlite::{OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use crate::Database;
use crate::error::{DbError, Result};

/// Fixed token lifetime: 15 minutes.
pub const TOKEN_TTL_MS: i64 = 15 * 60 * 1000;

impl Database {
    /// Issue a fresh single-use token bound to `email`. There is no cap
    /// on outstanding tokens per address.
    pub fn create_magic_token(&self, email: &str, now_ms: i64) -> Result<String> {
        let token = Uuid::new_v4().to_string();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO magic_tokens (token, email, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![token, email, now_ms + TOKEN_TTL_MS, now_ms],
            )?;
            Ok(())
        })?;

        info!("Created magic token for {}", email);
        Ok(token)
    }

    /// Verify and consume a token, returning the email it was bound to.
    /// Fails with `TokenInvalid` when no such row exists (never issued
    /// or already used) and `TokenExpired` past its lifetime. Every
    /// path that finds the row deletes it.
    pub fn verify_magic_token(&self, token: &str, now_ms: i64) -> Result<String> {
        let consumed: Option<(String, i64)> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "DELETE FROM magic_tokens WHERE token = ?1 RETURNING email, expires_at",
                    [token],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?)
        })?;

        match consumed {
            None => Err(DbError::TokenInvalid),
            Some((_, expires_at)) if now_ms > expires_at => Err(DbError::TokenExpired),
            Some((email, _)) => {
                info!("Verified magic token for {}", email);
                Ok(email)
            }
        }
    }

    /// Housekeeping: drop expired tokens. Correctness never depends on
    /// this — expired rows already fail verification.
    pub fn sweep_expired_tokens(&self, now_ms: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM magic_tokens WHERE expires_at < ?1",
                [now_ms],
            )?)
        })
    }
}
