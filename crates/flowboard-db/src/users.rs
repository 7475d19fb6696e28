use rusqlite::{OptionalExtension, params};
use tracing::info;

use crate::Database;
use crate::error::Result;
use crate::models::UserRow;

impl Database {
    /// Upsert on successful magic-link verification: first login for an
    /// email creates the user, later ones bump `last_login`. One
    /// transaction, so concurrent first logins cannot race into a
    /// duplicate insert.
    pub fn get_or_create_user(&self, email: &str, now_ms: i64) -> Result<UserRow> {
        self.with_tx(|tx| {
            let existing = tx
                .query_row(
                    "SELECT id, email, created_at, last_login FROM users WHERE email = ?1",
                    [email],
                    map_user_row,
                )
                .optional()?;

            match existing {
                Some(user) => {
                    tx.execute(
                        "UPDATE users SET last_login = ?1 WHERE id = ?2",
                        params![now_ms, user.id],
                    )?;
                    Ok(UserRow {
                        last_login: now_ms,
                        ..user
                    })
                }
                None => {
                    let user = tx.query_row(
                        "INSERT INTO users (email, created_at, last_login)
                         VALUES (?1, ?2, ?2)
                         RETURNING id, email, created_at, last_login",
                        params![email, now_ms],
                        map_user_row,
                    )?;
                    info!("Created user {}", user.email);
                    Ok(user)
                }
            }
        })
    }
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        created_at: row.get(2)?,
        last_login: row.get(3)?,
    })
}
