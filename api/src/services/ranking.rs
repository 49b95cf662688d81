//! Rank / Leaderboard Projection
//!
//! 저장된 상태 없이 매 조회마다 잔액 행으로부터 다시 계산한다.
//! 등급은 누적 포인트(lifetime_points) 기준이다.

use serde::Serialize;

use crate::db::Account;

/// 등급 하나 (하한 포함)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub level: u32,
    pub name: String,
    pub threshold: i64,
}

/// 오름차순 임계값 등급표
#[derive(Debug, Clone)]
pub struct RankTable {
    tiers: Vec<Tier>,
}

impl RankTable {
    /// `(threshold, name)` 목록으로 생성. 임계값 순으로 정렬되고 level이 매겨진다.
    /// 빈 목록이면 0점 등급 하나를 둔다.
    pub fn new(mut thresholds: Vec<(i64, &str)>) -> Self {
        if thresholds.is_empty() {
            thresholds.push((0, "Novato"));
        }
        thresholds.sort_by_key(|(threshold, _)| *threshold);

        let tiers = thresholds
            .into_iter()
            .enumerate()
            .map(|(level, (threshold, name))| Tier {
                level: level as u32,
                name: name.to_string(),
                threshold,
            })
            .collect();

        Self { tiers }
    }

    /// 재활용 등급 (Patentes)
    pub fn standard() -> Self {
        Self::new(vec![
            (0, "Novato"),
            (500, "Aprendiz"),
            (1_500, "Coletor"),
            (3_000, "Guardião"),
            (5_000, "Defensor"),
            (10_000, "Campeão"),
            (20_000, "Herói"),
            (50_000, "Lenda"),
        ])
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// 현재 등급: threshold <= points 인 가장 높은 등급
    pub fn tier_for(&self, points: i64) -> &Tier {
        self.tiers
            .iter()
            .rev()
            .find(|tier| points >= tier.threshold)
            .unwrap_or(&self.tiers[0])
    }

    pub fn next_tier(&self, current: &Tier) -> Option<&Tier> {
        self.tiers.get(current.level as usize + 1)
    }

    /// 다음 등급까지 진행률
    pub fn progress(&self, points: i64) -> RankProgress {
        let current = self.tier_for(points).clone();
        let next = self.next_tier(&current).cloned();

        let (progress_percent, points_to_next) = match &next {
            Some(next) => {
                let span = (next.threshold - current.threshold) as f64;
                let done = (points - current.threshold).max(0) as f64;
                ((done / span * 100.0).min(100.0), Some(next.threshold - points))
            }
            // 최고 등급
            None => (100.0, None),
        };

        RankProgress {
            points,
            current,
            next,
            progress_percent,
            points_to_next,
        }
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankProgress {
    pub points: i64,
    pub current: Tier,
    pub next: Option<Tier>,
    pub progress_percent: f64,
    pub points_to_next: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub position: u32,
    pub account_id: String,
    pub display_name: String,
    pub lifetime_points: i64,
    pub rank: String,
}

/// 누적 포인트 내림차순 상위 `limit`개
///
/// 동점 순서는 입력 순서를 유지한다 (stable sort). 별도 의미는 없다.
pub fn project_leaderboard(
    table: &RankTable,
    mut accounts: Vec<Account>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    accounts.sort_by(|a, b| b.lifetime_points.cmp(&a.lifetime_points));

    accounts
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, account)| LeaderboardEntry {
            position: i as u32 + 1,
            rank: table.tier_for(account.lifetime_points).name.clone(),
            account_id: account.id,
            display_name: account.display_name,
            lifetime_points: account.lifetime_points,
        })
        .collect()
}
