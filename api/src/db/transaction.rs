//! PostgreSQL `LedgerTx`
//!
//! READ COMMITTED + `SELECT ... FOR UPDATE`: 같은 계정에 대한 두 원장 연산은
//! 행 잠금에서 직렬화되고, 뒤에 온 쪽은 앞선 커밋 결과를 다시 읽는다.
//! `sqlx::Transaction`은 drop 시 rollback 한다.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::models::{Account, ActivityRecord, RedemptionRecord, Reward};
use super::repository::{LedgerResult, LedgerTx};

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl PgLedgerTx {
    pub(super) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_account(&mut self, id: &str) -> LedgerResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT
                id, display_name, email, total_points, lifetime_points,
                last_activity_at, created_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, display_name, email, total_points, lifetime_points,
                last_activity_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&account.id)
        .bind(&account.display_name)
        .bind(&account.email)
        .bind(account.total_points)
        .bind(account.lifetime_points)
        .bind(account.last_activity_at)
        .bind(account.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET display_name = $2,
                total_points = $3,
                lifetime_points = $4,
                last_activity_at = $5
            WHERE id = $1
            "#,
        )
        .bind(&account.id)
        .bind(&account.display_name)
        .bind(account.total_points)
        .bind(account.lifetime_points)
        .bind(account.last_activity_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_activity(
        &mut self,
        owner_id: &str,
        id: Uuid,
    ) -> LedgerResult<Option<ActivityRecord>> {
        let record = sqlx::query_as::<_, ActivityRecord>(
            r#"
            SELECT
                id, owner_id, material_type, quantity, unit, points_earned,
                status, source, rate_version, description, verifier_comment,
                occurred_at, validated_at, validated_by
            FROM recycling_records
            WHERE owner_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn insert_activity(&mut self, record: &ActivityRecord) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recycling_records (
                id, owner_id, material_type, quantity, unit, points_earned,
                status, source, rate_version, description, verifier_comment,
                occurred_at, validated_at, validated_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id)
        .bind(&record.owner_id)
        .bind(record.material_type)
        .bind(record.quantity)
        .bind(record.unit)
        .bind(record.points_earned)
        .bind(record.status)
        .bind(record.source)
        .bind(record.rate_version)
        .bind(&record.description)
        .bind(&record.verifier_comment)
        .bind(record.occurred_at)
        .bind(record.validated_at)
        .bind(&record.validated_by)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_activity_status(&mut self, record: &ActivityRecord) -> LedgerResult<()> {
        sqlx::query(
            r#"
            UPDATE recycling_records
            SET status = $3, validated_at = $4, validated_by = $5
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(&record.owner_id)
        .bind(record.id)
        .bind(record.status)
        .bind(record.validated_at)
        .bind(&record.validated_by)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_activity(&mut self, owner_id: &str, id: Uuid) -> LedgerResult<()> {
        sqlx::query("DELETE FROM recycling_records WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn lock_redemption(
        &mut self,
        owner_id: &str,
        id: Uuid,
    ) -> LedgerResult<Option<RedemptionRecord>> {
        let record = sqlx::query_as::<_, RedemptionRecord>(
            r#"
            SELECT id, owner_id, reward_id, reward_name, points_deducted, occurred_at
            FROM redemptions
            WHERE owner_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn insert_redemption(&mut self, record: &RedemptionRecord) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO redemptions (
                id, owner_id, reward_id, reward_name, points_deducted, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.owner_id)
        .bind(&record.reward_id)
        .bind(&record.reward_name)
        .bind(record.points_deducted)
        .bind(record.occurred_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_redemption(&mut self, owner_id: &str, id: Uuid) -> LedgerResult<()> {
        sqlx::query("DELETE FROM redemptions WHERE owner_id = $1 AND id = $2")
            .bind(owner_id)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn reward(&mut self, id: &str) -> LedgerResult<Option<Reward>> {
        let reward = sqlx::query_as::<_, Reward>(
            "SELECT id, name, description, required_points, image_ref FROM rewards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(reward)
    }

    async fn is_admin(&mut self, account_id: &str) -> LedgerResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM roles_admin WHERE user_id = $1")
                .bind(account_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(row.is_some())
    }

    async fn lock_admin_roles(&mut self) -> LedgerResult<i64> {
        sqlx::query("LOCK TABLE roles_admin IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *self.tx)
            .await?;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM roles_admin")
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count.0)
    }

    async fn grant_admin(
        &mut self,
        account_id: &str,
        granted_by: Option<&str>,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO roles_admin (user_id, granted_by, granted_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(granted_by)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
