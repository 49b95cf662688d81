//! Leaderboard Endpoint
//!
//! 누적 포인트 상위 N명. 매 요청마다 계정 행에서 다시 계산한다.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AuthUser;
use crate::error::ApiError;
use crate::services::{project_leaderboard, LeaderboardEntry};
use crate::AppState;

/// 한 번에 보여줄 수 있는 최대 인원
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    /// 호출자가 목록 안에 있으면 그 순위
    pub my_position: Option<u32>,
}

/// GET /leaderboard?limit=10
pub async fn get_leaderboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.config.leaderboard_limit)
        .clamp(1, MAX_LIMIT);

    let accounts = state.db.top_accounts(limit).await?;
    let entries = project_leaderboard(&state.ranks, accounts, limit as usize);
    let my_position = entries
        .iter()
        .find(|entry| entry.account_id == user.id)
        .map(|entry| entry.position);

    Ok(Json(LeaderboardResponse {
        entries,
        my_position,
    }))
}
