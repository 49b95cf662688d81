//! Recycling Endpoints
//!
//! 적립 기록 조회, 수동/사진 적립, 적립 취소.
//!
//! 포인트는 서버에서만 계산한다. 요청 본문에 포인트 필드는 없다.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthUser, PageQuery, Pagination};
use crate::db::{Account, ActivityRecord};
use crate::error::ApiError;
use crate::services::{ledger, LedgerOutcome, ManualLog, VerificationRequest};
use crate::types::{MaterialType, Unit};
use crate::AppState;

// ============ Request/Response Types ============

/// 수동 입력 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualLogRequest {
    pub material_type: MaterialType,
    pub quantity: f64,
    pub unit: Unit,
}

/// 사진 검증 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLogRequest {
    /// `data:<mimetype>;base64,<encoded_data>`
    pub photo_data_uri: String,
    #[serde(default)]
    pub description: String,
}

/// 적립 결과
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub record: ActivityRecord,
    pub total_points: i64,
    pub lifetime_points: i64,
}

impl From<LedgerOutcome<ActivityRecord>> for RecordResponse {
    fn from(outcome: LedgerOutcome<ActivityRecord>) -> Self {
        Self {
            total_points: outcome.account.total_points,
            lifetime_points: outcome.account.lifetime_points,
            record: outcome.record,
        }
    }
}

/// 사진 적립 결과 (AI 코멘트 포함)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecordResponse {
    #[serde(flatten)]
    pub result: RecordResponse,
    pub is_valid: bool,
    pub comment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordListResponse {
    pub records: Vec<ActivityRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub total_points: i64,
    pub lifetime_points: i64,
}

impl From<&Account> for BalanceResponse {
    fn from(account: &Account) -> Self {
        Self {
            total_points: account.total_points,
            lifetime_points: account.lifetime_points,
        }
    }
}

// ============ Handlers ============

/// GET /recycling?page=0&limit=20
pub async fn list_records(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<RecordListResponse>, ApiError> {
    let (page, limit) = query.resolve()?;
    let (records, total) = state.db.list_activities(&user.id, page, limit).await?;

    Ok(Json(RecordListResponse {
        records,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// POST /recycling/manual
pub async fn log_manual(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ManualLogRequest>,
) -> Result<(StatusCode, Json<RecordResponse>), ApiError> {
    let log = ManualLog {
        material: req.material_type,
        quantity: req.quantity,
        unit: req.unit,
    };

    let outcome = ledger::log_manual(
        state.db.as_ref(),
        &state.engine,
        &state.config.ledger_policy(),
        &user.id,
        &log,
        Utc::now(),
    )
    .await?;

    state
        .hub
        .publish(&outcome.account, outcome.record.is_credited())
        .await;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// POST /recycling/photo
///
/// AI 호출은 수 초 걸릴 수 있다. 실패하면 503이고 아무것도 기록되지 않는다.
pub async fn log_photo(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PhotoLogRequest>,
) -> Result<(StatusCode, Json<PhotoRecordResponse>), ApiError> {
    let request = VerificationRequest {
        photo_data_uri: req.photo_data_uri,
        description: req.description,
    };

    let (outcome, verdict) = ledger::log_photo(
        state.db.as_ref(),
        state.verifier.as_ref(),
        &state.engine,
        &state.config.ledger_policy(),
        &user.id,
        &request,
        Utc::now(),
    )
    .await?;

    state
        .hub
        .publish(&outcome.account, outcome.record.is_credited())
        .await;

    Ok((
        StatusCode::CREATED,
        Json(PhotoRecordResponse {
            result: outcome.into(),
            is_valid: verdict.is_valid,
            comment: verdict.comment,
        }),
    ))
}

/// DELETE /recycling/:id
///
/// 이미 적립된 기록이면 포인트를 되돌린다
pub async fn delete_record(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let outcome = ledger::delete_activity(state.db.as_ref(), &user.id, id).await?;
    state
        .hub
        .publish(&outcome.account, outcome.record.is_credited())
        .await;

    Ok(Json(BalanceResponse::from(&outcome.account)))
}
