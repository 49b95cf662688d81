//! Account Endpoints
//!
//! 계정 생성(첫 로그인), 잔액/등급 조회, 프로필, 대시보드 통계.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AuthUser;
use crate::db::Account;
use crate::error::ApiError;
use crate::services::{ledger, stats, AccountStats, FeedItem, RankProgress};
use crate::AppState;

// ============ Request/Response Types ============

/// 계정 + 등급 요약
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: Account,
    pub rank: String,
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: String,
}

/// 초기화 요청. 실수 방지를 위해 명시적 확인이 필요
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFeedResponse {
    pub items: Vec<FeedItem>,
}

// ============ Handlers ============

/// POST /account/sync
///
/// 첫 로그인 시 잔액 0 계정 생성. 이미 있으면 그대로 반환
pub async fn sync_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = ledger::ensure_account(
        state.db.as_ref(),
        &user.id,
        &user.display_name(),
        user.email.as_deref(),
    )
    .await?;

    respond(&state, account).await
}

/// GET /account
pub async fn get_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = load_account(&state, &user.id).await?;
    respond(&state, account).await
}

/// PATCH /account/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = ledger::update_display_name(state.db.as_ref(), &user.id, &req.display_name).await?;
    respond(&state, account).await
}

/// POST /account/reset
///
/// 사용 가능 포인트를 0으로. 되돌릴 수 없다
pub async fn reset_points(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ResetRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    if !req.confirm {
        return Err(ApiError::BadRequest(
            "Set \"confirm\": true to reset points".to_string(),
        ));
    }

    let account = ledger::reset_points(state.db.as_ref(), &user.id).await?;
    state.hub.publish(&account, false).await;

    respond(&state, account).await
}

/// GET /account/rank
pub async fn get_rank(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<RankProgress>, ApiError> {
    let account = load_account(&state, &user.id).await?;
    Ok(Json(state.ranks.progress(account.lifetime_points)))
}

/// GET /account/activity
///
/// 최근 적립 5건 + 교환 5건, 최신순
pub async fn get_activity_feed(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ActivityFeedResponse>, ApiError> {
    let per_kind = stats::FEED_PER_KIND as u32;
    let (activities, _) = state.db.list_activities(&user.id, 0, per_kind).await?;
    let redemptions = state.db.list_redemptions(&user.id, per_kind).await?;

    Ok(Json(ActivityFeedResponse {
        items: stats::recent_feed(&activities, &redemptions),
    }))
}

/// GET /account/stats
pub async fn get_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AccountStats>, ApiError> {
    let records = state.db.all_activities(&user.id).await?;
    Ok(Json(AccountStats::compute(&records, Utc::now())))
}

// ============ Helpers ============

pub(crate) async fn load_account(state: &AppState, id: &str) -> Result<Account, ApiError> {
    state
        .db
        .get_account(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account".to_string()))
}

async fn respond(state: &AppState, account: Account) -> Result<Json<AccountResponse>, ApiError> {
    let is_admin = state.db.is_admin(&account.id).await?;
    Ok(Json(AccountResponse {
        rank: state.ranks.tier_for(account.lifetime_points).name.clone(),
        is_admin,
        account,
    }))
}
