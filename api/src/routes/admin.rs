//! Admin Endpoints
//!
//! 검증 큐와 관리자 권한.
//!
//! 승인/거절/권한 부여는 트랜잭션 안에서 관리자 여부를 다시 확인한다.
//! 큐 조회는 읽기 전용이라 풀에서 바로 확인한다.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recycling::RecordResponse;
use super::AuthUser;
use crate::db::ModerationEntry;
use crate::error::ApiError;
use crate::services::{approval, Decision};
use crate::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueFilter {
    #[default]
    Pending,
    Validated,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(default)]
    pub status: QueueFilter,
    /// 기본 50, 최대 200
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    pub records: Vec<ModerationEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub user_id: String,
    pub is_admin: bool,
}

/// GET /admin/records?status=pending|validated
pub async fn list_records(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueResponse>, ApiError> {
    if !state.db.is_admin(&user.id).await? {
        return Err(ApiError::Forbidden("administrator role required".to_string()));
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let records = state
        .db
        .moderation_queue(query.status == QueueFilter::Pending, limit)
        .await?;

    Ok(Json(QueueResponse { records }))
}

/// POST /admin/records/:owner_id/:id/approve
pub async fn approve_record(
    State(state): State<AppState>,
    user: AuthUser,
    Path((owner_id, id)): Path<(String, Uuid)>,
) -> Result<Json<RecordResponse>, ApiError> {
    moderate(state, user, owner_id, id, Decision::Approve).await
}

/// POST /admin/records/:owner_id/:id/reject
pub async fn reject_record(
    State(state): State<AppState>,
    user: AuthUser,
    Path((owner_id, id)): Path<(String, Uuid)>,
) -> Result<Json<RecordResponse>, ApiError> {
    moderate(state, user, owner_id, id, Decision::Reject).await
}

async fn moderate(
    state: AppState,
    user: AuthUser,
    owner_id: String,
    record_id: Uuid,
    decision: Decision,
) -> Result<Json<RecordResponse>, ApiError> {
    let outcome = approval::decide(
        state.db.as_ref(),
        &user.id,
        &owner_id,
        record_id,
        decision,
        Utc::now(),
    )
    .await?;

    let credited = outcome.record.is_credited();
    state.hub.publish(&outcome.account, credited).await;

    Ok(Json(outcome.into()))
}

/// POST /admin/bootstrap
///
/// 관리자가 아무도 없을 때만 호출자를 첫 관리자로 만든다
pub async fn bootstrap(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    approval::bootstrap_admin(state.db.as_ref(), &user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RoleResponse {
            user_id: user.id,
            is_admin: true,
        }),
    ))
}

/// POST /admin/roles/:user_id
pub async fn grant_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(target_id): Path<String>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    approval::grant_admin(state.db.as_ref(), &user.id, &target_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RoleResponse {
            user_id: target_id,
            is_admin: true,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_filter_parsing() {
        let query: QueueQuery = serde_json::from_str(r#"{"status":"validated"}"#).unwrap();
        assert_eq!(query.status, QueueFilter::Validated);

        let query: QueueQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.status, QueueFilter::Pending);

        assert!(serde_json::from_str::<QueueQuery>(r#"{"status":"approved"}"#).is_err());
    }
}
