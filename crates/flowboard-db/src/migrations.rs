use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            email       TEXT NOT NULL UNIQUE,
            created_at  INTEGER NOT NULL,
            last_login  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS requests (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            status      TEXT NOT NULL DEFAULT 'pending',
            vote_count  INTEGER NOT NULL DEFAULT 0,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_requests_status
            ON requests(status);
        CREATE INDEX IF NOT EXISTS idx_requests_vote_count
            ON requests(vote_count DESC);
        CREATE INDEX IF NOT EXISTS idx_requests_user_created
            ON requests(user_id, created_at);

        CREATE TABLE IF NOT EXISTS votes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id  INTEGER NOT NULL REFERENCES requests(id),
            user_id     INTEGER NOT NULL REFERENCES users(id),
            created_at  INTEGER NOT NULL,
            UNIQUE(request_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_votes_request
            ON votes(request_id);
        CREATE INDEX IF NOT EXISTS idx_votes_user_created
            ON votes(user_id, created_at);

        CREATE TABLE IF NOT EXISTS magic_tokens (
            token       TEXT PRIMARY KEY,
            email       TEXT NOT NULL,
            expires_at  INTEGER NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tokens_expires
            ON magic_tokens(expires_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
