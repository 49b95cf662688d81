//! Database Module
//!
//! PostgreSQL + SQLx.
//!
//! - 원장 변경(적립/차감/승인/취소)은 전부 `LedgerStore::begin()` 트랜잭션을 거친다.
//! - 이 파일의 나머지 메서드는 조회 전용이며 트랜잭션 없이 풀에서 바로 읽는다.
//!   (대시보드, 리더보드 등은 약간 stale 해도 무방)

mod models;
mod repository;
mod transaction;

pub use models::*;
pub use repository::{LedgerResult, LedgerStore, LedgerTx};
pub use transaction::PgLedgerTx;

#[cfg(test)]
pub use repository::mock;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::types::RecordStatus;

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10
    /// - min_connections: 1
    /// - acquire_timeout: 3초 (초과 시 Transient 에러)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = Self::pool_options().connect(database_url).await?;
        Ok(Self { pool })
    }

    /// 첫 쿼리 시점까지 연결을 미루는 풀
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = Self::pool_options().connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    fn pool_options() -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 계정 조회
    pub async fn get_account(&self, id: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, display_name, email, total_points, lifetime_points,
                last_activity_at, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// 적립 히스토리 조회 (페이지네이션, 최신순)
    pub async fn list_activities(
        &self,
        owner_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<ActivityRecord>, i64), sqlx::Error> {
        let offset = i64::from(page) * i64::from(limit);

        let records = sqlx::query_as::<_, ActivityRecord>(
            r#"
            SELECT
                id, owner_id, material_type, quantity, unit, points_earned,
                status, source, rate_version, description, verifier_comment,
                occurred_at, validated_at, validated_by
            FROM recycling_records
            WHERE owner_id = $1
            ORDER BY occurred_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        // 전체 개수
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM recycling_records WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;

        Ok((records, count.0))
    }

    /// 통계용 전체 적립 기록 (오래된 순)
    pub async fn all_activities(&self, owner_id: &str) -> Result<Vec<ActivityRecord>, sqlx::Error> {
        sqlx::query_as::<_, ActivityRecord>(
            r#"
            SELECT
                id, owner_id, material_type, quantity, unit, points_earned,
                status, source, rate_version, description, verifier_comment,
                occurred_at, validated_at, validated_by
            FROM recycling_records
            WHERE owner_id = $1
            ORDER BY occurred_at ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    /// 교환 히스토리 (최신순)
    pub async fn list_redemptions(
        &self,
        owner_id: &str,
        limit: u32,
    ) -> Result<Vec<RedemptionRecord>, sqlx::Error> {
        sqlx::query_as::<_, RedemptionRecord>(
            r#"
            SELECT id, owner_id, reward_id, reward_name, points_deducted, occurred_at
            FROM redemptions
            WHERE owner_id = $1
            ORDER BY occurred_at DESC
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
    }

    /// 리워드 카탈로그 (필요 포인트 오름차순)
    pub async fn list_rewards(&self) -> Result<Vec<Reward>, sqlx::Error> {
        sqlx::query_as::<_, Reward>(
            r#"
            SELECT id, name, description, required_points, image_ref
            FROM rewards
            ORDER BY required_points ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// 누적 포인트 상위 N개 계정
    pub async fn top_accounts(&self, limit: u32) -> Result<Vec<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, display_name, email, total_points, lifetime_points,
                last_activity_at, created_at
            FROM users
            ORDER BY lifetime_points DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
    }

    /// 관리자 검증 큐
    ///
    /// - pending: 오래된 제출 먼저
    /// - approved/rejected: 최근 검증 먼저
    pub async fn moderation_queue(
        &self,
        pending: bool,
        limit: u32,
    ) -> Result<Vec<ModerationEntry>, sqlx::Error> {
        let (statuses, order) = if pending {
            (vec![RecordStatus::Pending], "r.occurred_at ASC")
        } else {
            (
                vec![RecordStatus::Approved, RecordStatus::Rejected],
                "r.validated_at DESC NULLS LAST",
            )
        };
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

        let sql = format!(
            r#"
            SELECT
                r.id, r.owner_id, r.material_type, r.quantity, r.unit, r.points_earned,
                r.status, r.source, r.rate_version, r.description, r.verifier_comment,
                r.occurred_at, r.validated_at, r.validated_by,
                u.display_name AS owner_name
            FROM recycling_records r
            JOIN users u ON u.id = r.owner_id
            WHERE r.status = ANY($1)
            ORDER BY {}
            LIMIT $2
            "#,
            order
        );

        sqlx::query_as::<_, ModerationEntry>(&sql)
            .bind(statuses)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
    }

    /// 관리자 여부 (조회 전용 경로용)
    pub async fn is_admin(&self, account_id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM roles_admin WHERE user_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl LedgerStore for Database {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> LedgerResult<PgLedgerTx> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTx::new(tx))
    }

    async fn account(&self, id: &str) -> LedgerResult<Option<Account>> {
        Ok(self.get_account(id).await?)
    }
}
