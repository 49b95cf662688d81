//! Account statistics
//!
//! 대시보드용 집계. 전부 읽기 전용이고 이미 조회된 기록에서 계산한다.
//! 적립(approved)된 기록만 센다.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{ActivityRecord, RedemptionRecord};
use crate::types::{MaterialType, RecordStatus, Unit};

/// 최근 활동 피드에서 종류별로 가져오는 개수
pub const FEED_PER_KIND: usize = 5;

/// 일별 차트 기간 (오늘 포함)
pub const DAILY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialTotal {
    pub material: MaterialType,
    pub unit: Unit,
    pub quantity: f64,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuantity {
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStats {
    pub materials: Vec<MaterialTotal>,
    pub daily: Vec<DailyQuantity>,
}

impl AccountStats {
    pub fn compute(records: &[ActivityRecord], now: DateTime<Utc>) -> Self {
        Self {
            materials: material_totals(records),
            daily: daily_quantities(records, now),
        }
    }
}

/// 소재/단위별 수량과 포인트 합계
///
/// 그램과 개수는 더하지 않는다. 소재 표시 순서는 `MaterialType::ALL` 순.
pub fn material_totals(records: &[ActivityRecord]) -> Vec<MaterialTotal> {
    let mut totals: BTreeMap<(usize, &'static str), MaterialTotal> = BTreeMap::new();

    for record in records.iter().filter(|r| r.is_credited()) {
        let order = MaterialType::ALL
            .iter()
            .position(|m| *m == record.material_type)
            .unwrap_or(MaterialType::ALL.len());

        let entry = totals
            .entry((order, record.unit.as_str()))
            .or_insert_with(|| MaterialTotal {
                material: record.material_type,
                unit: record.unit,
                quantity: 0.0,
                points: 0,
            });
        entry.quantity += record.quantity;
        entry.points += record.points_earned;
    }

    totals.into_values().collect()
}

/// 최근 7일 일별 수량 (UTC 날짜 기준, 기록 없는 날은 0)
pub fn daily_quantities(records: &[ActivityRecord], now: DateTime<Utc>) -> Vec<DailyQuantity> {
    let today = now.date_naive();
    let first = today - Duration::days(DAILY_WINDOW_DAYS - 1);

    let mut days: BTreeMap<NaiveDate, f64> = (0..DAILY_WINDOW_DAYS)
        .map(|offset| (first + Duration::days(offset), 0.0))
        .collect();

    for record in records.iter().filter(|r| r.is_credited()) {
        if let Some(quantity) = days.get_mut(&record.occurred_at.date_naive()) {
            *quantity += record.quantity;
        }
    }

    days.into_iter()
        .map(|(date, quantity)| DailyQuantity { date, quantity })
        .collect()
}

/// 최근 활동 피드 항목
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FeedItem {
    #[serde(rename_all = "camelCase")]
    Recycling {
        id: Uuid,
        material_type: MaterialType,
        points_earned: i64,
        status: RecordStatus,
        occurred_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Redemption {
        id: Uuid,
        reward_name: String,
        points_deducted: i64,
        occurred_at: DateTime<Utc>,
    },
}

impl FeedItem {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FeedItem::Recycling { occurred_at, .. } | FeedItem::Redemption { occurred_at, .. } => {
                *occurred_at
            }
        }
    }
}

impl From<&ActivityRecord> for FeedItem {
    fn from(record: &ActivityRecord) -> Self {
        FeedItem::Recycling {
            id: record.id,
            material_type: record.material_type,
            points_earned: record.points_earned,
            status: record.status,
            occurred_at: record.occurred_at,
        }
    }
}

impl From<&RedemptionRecord> for FeedItem {
    fn from(record: &RedemptionRecord) -> Self {
        FeedItem::Redemption {
            id: record.id,
            reward_name: record.reward_name.clone(),
            points_deducted: record.points_deducted,
            occurred_at: record.occurred_at,
        }
    }
}

/// 최근 적립 5건 + 교환 5건을 최신순으로 합친다
pub fn recent_feed(
    activities: &[ActivityRecord],
    redemptions: &[RedemptionRecord],
) -> Vec<FeedItem> {
    let mut activities: Vec<&ActivityRecord> = activities.iter().collect();
    activities.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    let mut redemptions: Vec<&RedemptionRecord> = redemptions.iter().collect();
    redemptions.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

    let mut feed: Vec<FeedItem> = activities
        .into_iter()
        .take(FEED_PER_KIND)
        .map(FeedItem::from)
        .chain(redemptions.into_iter().take(FEED_PER_KIND).map(FeedItem::from))
        .collect();

    feed.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
    feed
}
