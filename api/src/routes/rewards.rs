//! Rewards Endpoints
//!
//! 카탈로그 조회, 교환(차감), 교환 히스토리와 취소.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recycling::BalanceResponse;
use super::AuthUser;
use crate::db::{RedemptionRecord, Reward};
use crate::error::ApiError;
use crate::services::ledger;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardCatalogResponse {
    pub rewards: Vec<RewardView>,
}

/// 카탈로그 항목 + 호출자가 지금 교환 가능한지
///
/// `affordable`은 표시용이다. 실제 판단은 교환 트랜잭션 안에서 다시 한다.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardView {
    #[serde(flatten)]
    pub reward: Reward,
    pub affordable: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub redemption: RedemptionRecord,
    pub total_points: i64,
}

#[derive(Debug, Deserialize)]
pub struct RedemptionQuery {
    /// 기본 50, 최대 200
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionListResponse {
    pub redemptions: Vec<RedemptionRecord>,
}

/// GET /rewards
pub async fn list_rewards(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<RewardCatalogResponse>, ApiError> {
    let balance = state
        .db
        .get_account(&user.id)
        .await?
        .map(|account| account.total_points)
        .unwrap_or(0);

    let rewards = state
        .db
        .list_rewards()
        .await?
        .into_iter()
        .map(|reward| RewardView {
            affordable: balance >= reward.required_points,
            reward,
        })
        .collect();

    Ok(Json(RewardCatalogResponse { rewards }))
}

/// POST /rewards/:id/redeem
///
/// 잔액이 부족하면 409 INSUFFICIENT_BALANCE, 아무것도 기록되지 않는다
pub async fn redeem_reward(
    State(state): State<AppState>,
    user: AuthUser,
    Path(reward_id): Path<String>,
) -> Result<(StatusCode, Json<RedeemResponse>), ApiError> {
    let outcome = ledger::redeem(state.db.as_ref(), &user.id, &reward_id, Utc::now()).await?;
    state.hub.publish(&outcome.account, false).await;

    Ok((
        StatusCode::CREATED,
        Json(RedeemResponse {
            total_points: outcome.account.total_points,
            redemption: outcome.record,
        }),
    ))
}

/// GET /redemptions?limit=50
pub async fn list_redemptions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RedemptionQuery>,
) -> Result<Json<RedemptionListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let redemptions = state.db.list_redemptions(&user.id, limit).await?;

    Ok(Json(RedemptionListResponse { redemptions }))
}

/// DELETE /redemptions/:id
///
/// 차감했던 포인트를 사용 가능 포인트로 돌려준다
pub async fn delete_redemption(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let account = ledger::delete_redemption(state.db.as_ref(), &user.id, id).await?;
    state.hub.publish(&account, false).await;

    Ok(Json(BalanceResponse::from(&account)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::lazy_state;
    use crate::create_router;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_redeem_requires_identity() {
        let app = create_router(lazy_state());
        let request = Request::builder()
            .method("POST")
            .uri("/rewards/reward-frisbee/redeem")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_delete_redemption_rejects_malformed_id() {
        let app = create_router(lazy_state());
        let request = Request::builder()
            .method("DELETE")
            .uri("/redemptions/not-a-uuid")
            .header("x-user-id", "u1")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
