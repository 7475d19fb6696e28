use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use flowboard_db::ledger::{ListParams, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use flowboard_db::models::{SortKey, StatusFilter};
use flowboard_types::api::{CreateRequestBody, ListQuery};

use crate::error::ApiError;
use crate::extract::{AuthUser, MaybeAuthUser};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;

/// POST /api/feature-requests — create a request owned by the caller.
/// The ledger re-validates and enforces the daily quota inside its own
/// transaction; the checks here just produce early, friendly errors.
pub async fn create(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(body): Json<CreateRequestBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let title = body.title.trim();
    let description = body.description.trim();

    if title.is_empty() {
        return Err(ApiError::Validation("标题不能为空".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::Validation("标题不能超过 200 个字符".into()));
    }
    if description.is_empty() {
        return Err(ApiError::Validation("描述不能为空".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::Validation("描述不能超过 2000 个字符".into()));
    }

    let row = state
        .db
        .create_request(title, description, claims.sub, Utc::now().timestamp_millis())?;

    info!("User {} created request: {}", claims.email, row.title);
    Ok(Json(json!({ "success": true, "data": row })))
}

/// GET /api/feature-requests — list with status filter, sort, and
/// pagination. Authentication is optional; a valid bearer token makes
/// `has_voted` reflect the caller.
pub async fn list(
    State(state): State<AppState>,
    MaybeAuthUser(claims): MaybeAuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let params = ListParams {
        status: parse_status(query.status.as_deref())?,
        sort: parse_sort(query.sort.as_deref()),
        limit: query.limit.unwrap_or(DEFAULT_LIMIT),
        offset: query.offset.unwrap_or(0),
        user_id: claims.as_ref().map(|c| c.sub),
    };

    let (items, total) = state.db.list_requests(&params)?;

    Ok(Json(json!({
        "success": true,
        "data": items,
        "total": total,
        "offset": params.offset,
        "limit": params.limit,
    })))
}

/// POST /api/feature-requests/:id/vote — toggle the caller's vote.
pub async fn vote(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request_id: i64 = id
        .parse()
        .map_err(|_| ApiError::Validation("无效的需求 ID".into()))?;

    let result = state
        .db
        .toggle_vote(request_id, claims.sub, Utc::now().timestamp_millis())?;

    info!(
        "User {} {} request {}",
        claims.email,
        if result.has_voted { "voted" } else { "unvoted" },
        request_id
    );

    Ok(Json(json!({
        "success": true,
        "data": { "voteCount": result.vote_count, "hasVoted": result.has_voted },
    })))
}

/// POST /api/feature-requests/seed — sample data for local testing.
/// Disabled outside dev mode.
pub async fn seed(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.dev_mode {
        return Err(ApiError::Validation("仅开发环境可用".into()));
    }

    let now_ms = Utc::now().timestamp_millis();
    let users: Vec<_> = ["user1@example.com", "user2@example.com", "user3@example.com"]
        .iter()
        .map(|email| state.db.get_or_create_user(email, now_ms))
        .collect::<Result<_, _>>()?;

    let samples = [
        ("支持暗黑模式", "夜间使用时希望能切换到暗黑模式，保护眼睛", 0),
        ("添加邮件摘要", "每周将热门需求汇总成一封邮件发送给我", 1),
        ("需求进度通知", "我投票的需求状态变化时能收到提醒", 2),
        ("支持 Markdown 描述", "需求描述里希望能写 Markdown，贴代码和列表", 0),
        ("移动端适配", "手机浏览器上排版错乱，希望适配小屏幕", 1),
    ];

    let mut request_ids = Vec::new();
    for (title, description, owner) in samples {
        let row = state
            .db
            .create_request(title, description, users[owner].id, now_ms)?;
        request_ids.push(row.id);
    }

    // A few votes so the default sort has something to order by.
    state.db.toggle_vote(request_ids[0], users[1].id, now_ms)?;
    state.db.toggle_vote(request_ids[0], users[2].id, now_ms)?;
    state.db.toggle_vote(request_ids[1], users[0].id, now_ms)?;
    state.db.toggle_vote(request_ids[1], users[2].id, now_ms)?;
    state.db.toggle_vote(request_ids[2], users[0].id, now_ms)?;

    info!("Seeded {} sample requests", request_ids.len());
    Ok(Json(json!({
        "success": true,
        "message": "测试数据已创建",
        "data": { "users": users.len(), "requests": request_ids.len() },
    })))
}

fn parse_status(raw: Option<&str>) -> Result<StatusFilter, ApiError> {
    match raw.unwrap_or("all") {
        "all" => Ok(StatusFilter::All),
        other => other
            .parse()
            .map(StatusFilter::Only)
            .map_err(|_| ApiError::Validation("无效的状态参数".into())),
    }
}

fn parse_sort(raw: Option<&str>) -> SortKey {
    match raw {
        Some("created") => SortKey::Created,
        _ => SortKey::Votes,
    }
}
