//! Request/vote ledger: creates feature requests, lists them, and
//! toggles votes while keeping the denormalized `vote_count` in
//! lock-step with the vote rows.
//!
//! Daily quotas are enforced *inside* the write transactions here, so
//! the invariants hold no matter what the handler layer does. The
//! matching pure `check_*_quota` reads exist for callers that want to
//! report quota state without mutating anything.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{error, info};

use crate::Database;
use crate::error::{DbError, QuotaKind, Result};
use crate::models::{RateLimit, RequestRow, RequestWithUser, SortKey, StatusFilter, VoteState};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

pub const REQUESTS_PER_DAY: i64 = 3;
pub const VOTES_PER_DAY: i64 = 20;

/// Sliding rate-limit window: trailing 24 hours, not calendar days.
pub const RATE_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
pub struct ListParams {
    pub status: StatusFilter,
    pub sort: SortKey,
    pub limit: i64,
    pub offset: i64,
    /// When present, `has_voted` is computed relative to this user.
    pub user_id: Option<i64>,
}

impl Database {
    /// Insert a new feature request owned by `user_id`. Input is
    /// trimmed and re-validated here even though the handler already
    /// checked it; the quota check runs inside the same transaction as
    /// the insert.
    pub fn create_request(
        &self,
        title: &str,
        description: &str,
        user_id: i64,
        now_ms: i64,
    ) -> Result<RequestRow> {
        let title = title.trim();
        let description = description.trim();

        if title.is_empty() {
            return Err(DbError::InvalidInput("标题不能为空".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(DbError::InvalidInput("标题不能超过 200 个字符".into()));
        }
        if description.is_empty() {
            return Err(DbError::InvalidInput("描述不能为空".into()));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DbError::InvalidInput("描述不能超过 2000 个字符".into()));
        }

        self.with_tx(|tx| {
            let count = count_requests_since(tx, user_id, now_ms - RATE_WINDOW_MS)?;
            if count >= REQUESTS_PER_DAY {
                return Err(DbError::RateLimited {
                    kind: QuotaKind::Requests,
                    count,
                    limit: REQUESTS_PER_DAY,
                });
            }

            let row = tx.query_row(
                "INSERT INTO requests (title, description, user_id, status, vote_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?4)
                 RETURNING id, title, description, user_id, status, vote_count, created_at, updated_at",
                params![title, description, user_id, now_ms],
                map_request_row,
            )?;

            info!("User {} created request {}", user_id, row.id);
            Ok(row)
        })
    }

    /// List requests with the owner's masked email and, when `user_id`
    /// is set, whether that user has voted on each item. Also returns
    /// the total count matching the status filter, ignoring pagination.
    pub fn list_requests(&self, params: &ListParams) -> Result<(Vec<RequestWithUser>, i64)> {
        let limit = params.limit.max(0);
        let offset = params.offset.max(0);

        // No user id 0 exists (AUTOINCREMENT starts at 1), so binding 0
        // makes the EXISTS probe uniformly false for anonymous callers.
        let viewer = params.user_id.unwrap_or(0);

        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT r.id, r.title, r.description, r.user_id, r.status, r.vote_count,
                        r.created_at, r.updated_at, u.email,
                        EXISTS(SELECT 1 FROM votes v WHERE v.request_id = r.id AND v.user_id = ?1)
                 FROM requests r
                 JOIN users u ON r.user_id = u.id",
            );

            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(viewer)];
            if let StatusFilter::Only(status) = params.status {
                sql.push_str(" WHERE r.status = ?2");
                args.push(Box::new(status));
            }

            sql.push_str(match params.sort {
                SortKey::Votes => " ORDER BY r.vote_count DESC, r.id ASC",
                SortKey::Created => " ORDER BY r.created_at DESC, r.id ASC",
            });
            sql.push_str(&format!(
                " LIMIT ?{} OFFSET ?{}",
                args.len() + 1,
                args.len() + 2
            ));
            args.push(Box::new(limit));
            args.push(Box::new(offset));

            let mut stmt = conn.prepare(&sql)?;
            let refs: Vec<&dyn rusqlite::types::ToSql> =
                args.iter().map(|b| b.as_ref()).collect();

            let items = stmt
                .query_map(refs.as_slice(), |row| {
                    Ok(RequestWithUser {
                        request: RequestRow {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                            user_id: row.get(3)?,
                            status: row.get(4)?,
                            vote_count: row.get(5)?,
                            created_at: row.get(6)?,
                            updated_at: row.get(7)?,
                        },
                        // Masked below; the raw address never leaves this module.
                        user_email: row.get(8)?,
                        has_voted: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut items = items;
            for item in &mut items {
                item.user_email = mask_email(&item.user_email);
            }

            let total: i64 = match params.status {
                StatusFilter::All => {
                    conn.query_row("SELECT COUNT(*) FROM requests", [], |r| r.get(0))?
                }
                StatusFilter::Only(status) => conn.query_row(
                    "SELECT COUNT(*) FROM requests WHERE status = ?1",
                    params![status],
                    |r| r.get(0),
                )?,
            };

            Ok((items, total))
        })
    }

    /// Two-state vote toggle. Existing vote: delete it and decrement
    /// the counter. No vote: check the quota, insert, increment. All of
    /// it commits or rolls back as one transaction; the
    /// UNIQUE(request_id, user_id) constraint is the last line of
    /// defense against a duplicate insert, which is treated as
    /// "already voted" rather than an error.
    ///
    /// Removing a vote never consumes quota.
    pub fn toggle_vote(&self, request_id: i64, user_id: i64, now_ms: i64) -> Result<VoteState> {
        self.with_tx(|tx| {
            let request: Option<i64> = tx
                .query_row(
                    "SELECT id FROM requests WHERE id = ?1",
                    [request_id],
                    |r| r.get(0),
                )
                .optional()?;
            if request.is_none() {
                return Err(DbError::NotFound);
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM votes WHERE request_id = ?1 AND user_id = ?2",
                    params![request_id, user_id],
                    |r| r.get(0),
                )
                .optional()?;

            let has_voted = if let Some(vote_id) = existing {
                tx.execute("DELETE FROM votes WHERE id = ?1", [vote_id])?;
                tx.execute(
                    "UPDATE requests SET vote_count = vote_count - 1, updated_at = ?1 WHERE id = ?2",
                    params![now_ms, request_id],
                )?;
                false
            } else {
                let count = count_votes_since(tx, user_id, now_ms - RATE_WINDOW_MS)?;
                if count >= VOTES_PER_DAY {
                    return Err(DbError::RateLimited {
                        kind: QuotaKind::Votes,
                        count,
                        limit: VOTES_PER_DAY,
                    });
                }

                match tx.execute(
                    "INSERT INTO votes (request_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![request_id, user_id, now_ms],
                ) {
                    Ok(_) => {
                        tx.execute(
                            "UPDATE requests SET vote_count = vote_count + 1, updated_at = ?1 WHERE id = ?2",
                            params![now_ms, request_id],
                        )?;
                    }
                    // Concurrent insert slipped in: the vote exists, do
                    // not touch the counter again.
                    Err(e) if is_unique_violation(&e) => {}
                    Err(e) => return Err(e.into()),
                }
                true
            };

            let vote_count: i64 = tx.query_row(
                "SELECT vote_count FROM requests WHERE id = ?1",
                [request_id],
                |r| r.get(0),
            )?;
            if vote_count < 0 {
                // The vote_count == COUNT(votes) invariant is broken.
                error!("vote_count for request {} fell below zero", request_id);
            }

            Ok(VoteState {
                vote_count,
                has_voted,
            })
        })
    }

    /// Pure read: requests created by `user_id` in the trailing window
    /// vs. the daily quota. Never mutates.
    pub fn check_request_quota(&self, user_id: i64, now_ms: i64) -> Result<RateLimit> {
        self.with_conn(|conn| {
            let count = count_requests_since(conn, user_id, now_ms - RATE_WINDOW_MS)?;
            Ok(RateLimit {
                allowed: count < REQUESTS_PER_DAY,
                count,
                limit: REQUESTS_PER_DAY,
            })
        })
    }

    /// Pure read: votes cast by `user_id` in the trailing window vs.
    /// the daily quota. Vote *removal* is not counted against this.
    pub fn check_vote_quota(&self, user_id: i64, now_ms: i64) -> Result<RateLimit> {
        self.with_conn(|conn| {
            let count = count_votes_since(conn, user_id, now_ms - RATE_WINDOW_MS)?;
            Ok(RateLimit {
                allowed: count < VOTES_PER_DAY,
                count,
                limit: VOTES_PER_DAY,
            })
        })
    }
}

fn count_requests_since(conn: &Connection, user_id: i64, since_ms: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM requests WHERE user_id = ?1 AND created_at > ?2",
        params![user_id, since_ms],
        |r| r.get(0),
    )?)
}

fn count_votes_since(conn: &Connection, user_id: i64, since_ms: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE user_id = ?1 AND created_at > ?2",
        params![user_id, since_ms],
        |r| r.get(0),
    )?)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn map_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        user_id: row.get(3)?,
        status: row.get(4)?,
        vote_count: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Mask an email for public display: "foo@bar.com" -> "f***@bar.com".
/// Anything that does not look like an address is returned untouched.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            match local.chars().next() {
                Some(first) => format!("{first}***@{domain}"),
                None => email.to_string(),
            }
        }
        _ => email.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestStatus;

    const HOUR_MS: i64 = 60 * 60 * 1000;
    const T0: i64 = 1_700_000_000_000;

    fn db_with_user(email: &str) -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = db.get_or_create_user(email, T0).unwrap();
        (db, user.id)
    }

    fn votes_for(db: &Database, request_id: i64) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM votes WHERE request_id = ?1",
                [request_id],
                |r| r.get(0),
            )?)
        })
        .unwrap()
    }

    #[test]
    fn create_request_returns_pending_row() {
        let (db, user_id) = db_with_user("a@example.com");
        let row = db
            .create_request("  Dark mode  ", "Night-friendly theme", user_id, T0)
            .unwrap();

        assert_eq!(row.title, "Dark mode"); // trimmed
        assert_eq!(row.status, RequestStatus::Pending);
        assert_eq!(row.vote_count, 0);
        assert_eq!(row.user_id, user_id);
        assert_eq!(row.created_at, T0);
    }

    #[test]
    fn create_request_rejects_bad_input() {
        let (db, user_id) = db_with_user("a@example.com");

        assert!(matches!(
            db.create_request("   ", "desc", user_id, T0),
            Err(DbError::InvalidInput(_))
        ));
        assert!(matches!(
            db.create_request("title", "", user_id, T0),
            Err(DbError::InvalidInput(_))
        ));
        let long_title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(matches!(
            db.create_request(&long_title, "desc", user_id, T0),
            Err(DbError::InvalidInput(_))
        ));
        let long_desc = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(matches!(
            db.create_request("title", &long_desc, user_id, T0),
            Err(DbError::InvalidInput(_))
        ));
    }

    #[test]
    fn request_quota_is_a_sliding_window() {
        let (db, user_id) = db_with_user("a@example.com");

        db.create_request("one", "d", user_id, T0).unwrap();
        db.create_request("two", "d", user_id, T0 + HOUR_MS).unwrap();
        db.create_request("three", "d", user_id, T0 + 2 * HOUR_MS)
            .unwrap();

        // Fourth inside the window is denied with exact count/limit.
        let now = T0 + 2 * HOUR_MS;
        match db.create_request("four", "d", user_id, now) {
            Err(DbError::RateLimited { kind, count, limit }) => {
                assert_eq!(kind, QuotaKind::Requests);
                assert_eq!(count, 3);
                assert_eq!(limit, 3);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        let check = db.check_request_quota(user_id, now).unwrap();
        assert!(!check.allowed);
        assert_eq!((check.count, check.limit), (3, 3));

        // Once the oldest request ages past 24h, creation works again.
        let later = T0 + 24 * HOUR_MS + 60_000;
        assert!(db.check_request_quota(user_id, later).unwrap().allowed);
        db.create_request("four", "d", user_id, later).unwrap();
    }

    #[test]
    fn toggle_vote_is_an_involution() {
        let (db, user_id) = db_with_user("a@example.com");
        let voter = db.get_or_create_user("b@example.com", T0).unwrap().id;
        let request = db.create_request("t", "d", user_id, T0).unwrap();

        let on = db.toggle_vote(request.id, voter, T0).unwrap();
        assert!(on.has_voted);
        assert_eq!(on.vote_count, 1);
        assert_eq!(votes_for(&db, request.id), 1);

        let off = db.toggle_vote(request.id, voter, T0 + 1).unwrap();
        assert!(!off.has_voted);
        assert_eq!(off.vote_count, 0);
        assert_eq!(votes_for(&db, request.id), 0);
    }

    #[test]
    fn vote_count_matches_vote_rows_after_many_toggles() {
        let (db, owner) = db_with_user("owner@example.com");
        let request = db.create_request("t", "d", owner, T0).unwrap();

        let voters: Vec<i64> = (0..5)
            .map(|i| {
                db.get_or_create_user(&format!("v{i}@example.com"), T0)
                    .unwrap()
                    .id
            })
            .collect();

        // Every voter toggles on; voters 0 and 1 toggle back off.
        for &v in &voters {
            db.toggle_vote(request.id, v, T0).unwrap();
        }
        for &v in &voters[..2] {
            db.toggle_vote(request.id, v, T0 + 1).unwrap();
        }

        let state = db.toggle_vote(request.id, voters[0], T0 + 2).unwrap();
        assert_eq!(state.vote_count, votes_for(&db, request.id));
        assert_eq!(state.vote_count, 4);
    }

    #[test]
    fn vote_on_unknown_request_is_not_found() {
        let (db, user_id) = db_with_user("a@example.com");
        assert!(matches!(
            db.toggle_vote(9999, user_id, T0),
            Err(DbError::NotFound)
        ));
    }

    #[test]
    fn vote_quota_only_counts_net_new_votes() {
        let (db, owner) = db_with_user("owner@example.com");
        let voter = db.get_or_create_user("v@example.com", T0).unwrap().id;

        // 20 distinct requests, 20 votes: quota exhausted.
        let mut request_ids = Vec::new();
        for i in 0..20 {
            let creator = db
                .get_or_create_user(&format!("c{}@example.com", i / 3), T0)
                .unwrap()
                .id;
            let r = db
                .create_request(&format!("r{i}"), "d", creator, T0 + i)
                .unwrap();
            request_ids.push(r.id);
            db.toggle_vote(r.id, voter, T0 + i).unwrap();
        }
        let extra = db.create_request("extra", "d", owner, T0).unwrap();
        match db.toggle_vote(extra.id, voter, T0 + 100) {
            Err(DbError::RateLimited { kind, count, limit }) => {
                assert_eq!(kind, QuotaKind::Votes);
                assert_eq!((count, limit), (20, 20));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }

        // Removing an existing vote is never rate-limited.
        let off = db.toggle_vote(request_ids[0], voter, T0 + 101).unwrap();
        assert!(!off.has_voted);
    }

    #[test]
    fn list_sorts_by_votes_with_stable_tiebreak() {
        let (db, owner) = db_with_user("owner@example.com");
        let voter = db.get_or_create_user("v@example.com", T0).unwrap().id;

        let a = db.create_request("a", "d", owner, T0).unwrap();
        let b = db.create_request("b", "d", owner, T0 + 1).unwrap();
        let c = db.create_request("c", "d", owner, T0 + 2).unwrap();
        db.toggle_vote(b.id, voter, T0 + 3).unwrap();

        let (items, total) = db
            .list_requests(&ListParams {
                status: StatusFilter::All,
                sort: SortKey::Votes,
                limit: 50,
                offset: 0,
                user_id: None,
            })
            .unwrap();

        assert_eq!(total, 3);
        let ids: Vec<i64> = items.iter().map(|i| i.request.id).collect();
        // b leads on votes; a and c tie at zero and keep insertion order.
        assert_eq!(ids, vec![b.id, a.id, c.id]);
        assert!(items.iter().all(|i| !i.has_voted));
    }

    #[test]
    fn list_sorts_by_created_descending() {
        let (db, owner) = db_with_user("owner@example.com");
        let a = db.create_request("a", "d", owner, T0).unwrap();
        let b = db.create_request("b", "d", owner, T0 + 1000).unwrap();

        let (items, _) = db
            .list_requests(&ListParams {
                status: StatusFilter::All,
                sort: SortKey::Created,
                limit: 50,
                offset: 0,
                user_id: None,
            })
            .unwrap();

        let ids: Vec<i64> = items.iter().map(|i| i.request.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn list_reports_viewer_votes_and_masks_emails() {
        let (db, owner) = db_with_user("owner@example.com");
        let voter = db.get_or_create_user("v@example.com", T0).unwrap().id;
        let request = db.create_request("t", "d", owner, T0).unwrap();
        db.toggle_vote(request.id, voter, T0).unwrap();

        let params = ListParams {
            status: StatusFilter::All,
            sort: SortKey::Votes,
            limit: 50,
            offset: 0,
            user_id: Some(voter),
        };
        let (items, _) = db.list_requests(&params).unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].has_voted);
        assert_eq!(items[0].user_email, "o***@example.com");

        // Anonymous viewer: has_voted uniformly false.
        let (items, _) = db
            .list_requests(&ListParams {
                user_id: None,
                ..params
            })
            .unwrap();
        assert!(!items[0].has_voted);
    }

    #[test]
    fn list_filters_by_status_and_paginates() {
        let (db, owner) = db_with_user("owner@example.com");
        for i in 0..3 {
            db.create_request(&format!("r{i}"), "d", owner, T0 + i).unwrap();
        }

        let (items, total) = db
            .list_requests(&ListParams {
                status: StatusFilter::Only(RequestStatus::Completed),
                sort: SortKey::Created,
                limit: 50,
                offset: 0,
                user_id: None,
            })
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);

        // Pagination: total ignores limit/offset.
        let (items, total) = db
            .list_requests(&ListParams {
                status: StatusFilter::All,
                sort: SortKey::Created,
                limit: 2,
                offset: 2,
                user_id: None,
            })
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(total, 3);
    }

    #[test]
    fn mask_email_handles_odd_shapes() {
        assert_eq!(mask_email("foo@bar.com"), "f***@bar.com");
        assert_eq!(mask_email("f@bar.com"), "f***@bar.com");
        assert_eq!(mask_email("not-an-email"), "not-an-email");
        assert_eq!(mask_email("@bar.com"), "@bar.com");
        assert_eq!(mask_email("foo@"), "foo@");
    }
}
