//! Database Models
//!
//! Ledger rows: one balance row per account plus append-mostly earn and
//! redemption records owned by that account.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{MaterialType, RecordSource, RecordStatus, Unit};

/// 계정 잔액 문서 (users)
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// identity provider subject id
    pub id: String,

    pub display_name: String,

    pub email: Option<String>,

    /// 사용 가능한 포인트 (교환 시 차감). 항상 >= 0
    pub total_points: i64,

    /// 누적 획득 포인트 (랭킹 전용). 교환으로 줄지 않음
    pub lifetime_points: i64,

    /// 마지막 제출 시각 (cooldown 판단용)
    pub last_activity_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Account {
    /// 첫 로그인 시 생성되는 잔액 0 계정
    pub fn new(id: &str, display_name: &str, email: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            email: email.map(str::to_string),
            total_points: 0,
            lifetime_points: 0,
            last_activity_at: None,
            created_at: Utc::now(),
        }
    }
}

/// 재활용 적립 기록 (recycling_records)
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: Uuid,

    pub owner_id: String,

    pub material_type: MaterialType,

    pub quantity: f64,

    pub unit: Unit,

    /// 제출 시점에 확정된 포인트. 이후 재계산하지 않음
    pub points_earned: i64,

    pub status: RecordStatus,

    pub source: RecordSource,

    /// 포인트 계산에 사용된 요율표 버전
    pub rate_version: i32,

    /// 사용자 설명 (사진 제출 시)
    pub description: Option<String>,

    /// AI 검증 코멘트
    pub verifier_comment: Option<String>,

    pub occurred_at: DateTime<Utc>,

    pub validated_at: Option<DateTime<Utc>>,

    pub validated_by: Option<String>,
}

impl ActivityRecord {
    /// 잔액에 이미 반영된 기록인지
    pub fn is_credited(&self) -> bool {
        self.status == RecordStatus::Approved
    }
}

/// 리워드 교환 기록 (redemptions)
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub reward_id: String,
    pub reward_name: String,
    /// 교환 시점에 확정된 차감 포인트 (> 0)
    pub points_deducted: i64,
    pub occurred_at: DateTime<Utc>,
}

/// 리워드 카탈로그 (읽기 전용 seed 데이터)
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub description: String,
    pub required_points: i64,
    pub image_ref: Option<String>,
}

/// 관리자 검증 큐 항목 (기록 + 소유자 이름)
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: ActivityRecord,
    pub owner_name: String,
}
