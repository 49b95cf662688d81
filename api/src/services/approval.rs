//! Approval Workflow
//!
//! moderated 모드에서 pending 기록을 관리자가 승인/거절한다.
//!
//! ```text
//! pending ──approve──▶ approved  (적립 발생)
//!    │
//!    └────reject────▶ rejected  (잔액 변화 없음)
//! ```
//!
//! approved/rejected는 종료 상태다. 두 관리자가 같은 기록을 동시에 승인해도
//! 기록 행 잠금 뒤에 상태를 다시 보므로 적립은 한 번만 일어난다.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ledger::{credit, lock_existing_account, LedgerOutcome};
use crate::db::{ActivityRecord, LedgerResult, LedgerStore, LedgerTx};
use crate::error::LedgerError;
use crate::types::RecordStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// 상태 전이 규칙. 종료 상태에서는 어떤 결정도 `AlreadyProcessed`
pub fn transition(from: RecordStatus, decision: Decision) -> Result<RecordStatus, LedgerError> {
    match (from, decision) {
        (RecordStatus::Pending, Decision::Approve) => Ok(RecordStatus::Approved),
        (RecordStatus::Pending, Decision::Reject) => Ok(RecordStatus::Rejected),
        (RecordStatus::Approved | RecordStatus::Rejected, _) => {
            Err(LedgerError::AlreadyProcessed(from.as_str().to_string()))
        }
    }
}

/// 검증 결정 적용
///
/// 권한 확인, 상태 전이, 적립이 하나의 트랜잭션에서 일어난다.
pub async fn decide<S: LedgerStore>(
    store: &S,
    actor_id: &str,
    owner_id: &str,
    record_id: Uuid,
    decision: Decision,
    now: DateTime<Utc>,
) -> LedgerResult<LedgerOutcome<ActivityRecord>> {
    let mut tx = store.begin().await?;

    if !tx.is_admin(actor_id).await? {
        tracing::warn!(actor_id, record_id = %record_id, "Non-admin moderation attempt");
        return Err(admin_required());
    }

    let mut record = tx
        .lock_activity(owner_id, record_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound("Recycling record".to_string()))?;
    let mut account = lock_existing_account(&mut tx, owner_id).await?;

    record.status = transition(record.status, decision)?;
    record.validated_at = Some(now);
    record.validated_by = Some(actor_id.to_string());

    tx.update_activity_status(&record).await?;
    if record.is_credited() {
        credit(&mut account, record.points_earned);
        tx.update_account(&account).await?;
    }
    tx.commit().await?;

    tracing::info!(
        actor_id,
        owner_id,
        record_id = %record_id,
        status = %record.status,
        points = record.points_earned,
        "Recycling record moderated"
    );

    Ok(LedgerOutcome { record, account })
}

/// 관리자가 한 명도 없을 때만 호출자를 첫 관리자로 등록
pub async fn bootstrap_admin<S: LedgerStore>(store: &S, account_id: &str) -> LedgerResult<()> {
    let mut tx = store.begin().await?;

    let existing = tx.lock_admin_roles().await?;
    if existing > 0 {
        return Err(LedgerError::PermissionDenied(
            "an administrator already exists".to_string(),
        ));
    }

    lock_existing_account(&mut tx, account_id).await?;
    tx.grant_admin(account_id, None).await?;
    tx.commit().await?;

    tracing::warn!(account_id, "Bootstrapped first administrator");
    Ok(())
}

/// 기존 관리자가 다른 계정에 관리자 권한 부여
pub async fn grant_admin<S: LedgerStore>(
    store: &S,
    actor_id: &str,
    target_id: &str,
) -> LedgerResult<()> {
    let mut tx = store.begin().await?;

    if !tx.is_admin(actor_id).await? {
        return Err(admin_required());
    }
    lock_existing_account(&mut tx, target_id).await?;
    tx.grant_admin(target_id, Some(actor_id)).await?;
    tx.commit().await?;

    tracing::info!(actor_id, target_id, "Administrator role granted");
    Ok(())
}

fn admin_required() -> LedgerError {
    LedgerError::PermissionDenied("administrator role required".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MemoryStore;
    use crate::services::ledger::{log_manual, LedgerMode, LedgerPolicy, ManualLog};
    use crate::services::points::PointsEngine;
    use crate::types::{MaterialType, Unit};
    use std::sync::Arc;

    const MODERATED: LedgerPolicy = LedgerPolicy {
        mode: LedgerMode::Moderated,
        cooldown: None,
    };

    async fn pending_record(store: &MemoryStore, owner: &str) -> ActivityRecord {
        let log = ManualLog {
            material: MaterialType::Papel,
            quantity: 2000.0,
            unit: Unit::Gram,
        };
        log_manual(store, &PointsEngine::default(), &MODERATED, owner, &log, Utc::now())
            .await
            .unwrap()
            .record
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(
            transition(RecordStatus::Pending, Decision::Approve),
            Ok(RecordStatus::Approved)
        );
        assert_eq!(
            transition(RecordStatus::Pending, Decision::Reject),
            Ok(RecordStatus::Rejected)
        );
        assert_eq!(
            transition(RecordStatus::Approved, Decision::Reject),
            Err(LedgerError::AlreadyProcessed("approved".to_string()))
        );
        assert_eq!(
            transition(RecordStatus::Rejected, Decision::Approve),
            Err(LedgerError::AlreadyProcessed("rejected".to_string()))
        );
    }

    #[tokio::test]
    async fn test_approve_credits_both_balances() {
        let store = MemoryStore::new();
        store.seed_account("u1", 5, 5).await;
        store.seed_account("admin", 0, 0).await;
        store.seed_admin("admin").await;

        let record = pending_record(&store, "u1").await;
        assert_eq!(record.points_earned, 30);

        let outcome = decide(&store, "admin", "u1", record.id, Decision::Approve, Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.record.status, RecordStatus::Approved);
        assert_eq!(outcome.record.validated_by.as_deref(), Some("admin"));
        assert!(outcome.record.validated_at.is_some());
        assert_eq!(outcome.account.total_points, 35);
        assert_eq!(outcome.account.lifetime_points, 35);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_approvals_credit_once() {
        let store = Arc::new(MemoryStore::new());
        store.seed_account("u1", 0, 0).await;
        store.seed_account("admin-a", 0, 0).await;
        store.seed_account("admin-b", 0, 0).await;
        store.seed_admin("admin-a").await;
        store.seed_admin("admin-b").await;

        let record_id = pending_record(&store, "u1").await.id;

        let handles: Vec<_> = ["admin-a", "admin-b"]
            .into_iter()
            .map(|admin| {
                let store = store.clone();
                tokio::spawn(async move {
                    decide(store.as_ref(), admin, "u1", record_id, Decision::Approve, Utc::now())
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(LedgerError::AlreadyProcessed(_)))));

        let account = store.snapshot().await.accounts["u1"].clone();
        assert_eq!(account.total_points, 30);
        assert_eq!(account.lifetime_points, 30);
    }

    #[tokio::test]
    async fn test_reject_leaves_balance() {
        let store = MemoryStore::new();
        store.seed_account("u1", 5, 5).await;
        store.seed_account("admin", 0, 0).await;
        store.seed_admin("admin").await;

        let record = pending_record(&store, "u1").await;
        let outcome = decide(&store, "admin", "u1", record.id, Decision::Reject, Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.record.status, RecordStatus::Rejected);
        assert_eq!(outcome.account.total_points, 5);

        let err = decide(&store, "admin", "u1", record.id, Decision::Approve, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyProcessed(_)));
        assert_eq!(store.snapshot().await.accounts["u1"].total_points, 5);
    }

    #[tokio::test]
    async fn test_non_admin_is_denied() {
        let store = MemoryStore::new();
        store.seed_account("u1", 0, 0).await;
        store.seed_account("u2", 0, 0).await;

        let record = pending_record(&store, "u1").await;
        let err = decide(&store, "u2", "u1", record.id, Decision::Approve, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::PermissionDenied(_)));
        let state = store.snapshot().await;
        assert_eq!(state.activities[&record.id].status, RecordStatus::Pending);
        assert_eq!(state.accounts["u1"].total_points, 0);
    }

    #[tokio::test]
    async fn test_bootstrap_only_once() {
        let store = MemoryStore::new();
        store.seed_account("first", 0, 0).await;
        store.seed_account("second", 0, 0).await;

        bootstrap_admin(&store, "first").await.unwrap();
        let err = bootstrap_admin(&store, "second").await.unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied(_)));

        grant_admin(&store, "first", "second").await.unwrap();
        let admins = store.snapshot().await.admins;
        assert!(admins.contains("first"));
        assert!(admins.contains("second"));
    }

    #[tokio::test]
    async fn test_grant_requires_admin() {
        let store = MemoryStore::new();
        store.seed_account("u1", 0, 0).await;
        store.seed_account("u2", 0, 0).await;

        let err = grant_admin(&store, "u1", "u2").await.unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied(_)));
        assert!(store.snapshot().await.admins.is_empty());
    }
}
