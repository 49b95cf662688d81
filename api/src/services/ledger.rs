//! Transactional Ledger Updater
//!
//! 잔액 변경과 기록 추가/삭제를 하나의 트랜잭션으로 묶는다.
//! 모든 함수는 store와 계정 ID를 인자로 받는다 (전역 상태 없음).
//!
//! # Operations
//!
//! | 연산 | 잔액 | 기록 |
//! |---|---|---|
//! | credit (direct) | total += p, lifetime += p | insert (approved) |
//! | submit (moderated) | - | insert (pending) |
//! | redeem | total -= cost (부족하면 거부) | insert redemption |
//! | delete activity | approved면 total/lifetime -= p (0 하한) | delete |
//! | delete redemption | total += cost | delete |
//!
//! 잠금 순서는 항상 기록 → 계정 (승인 흐름과 동일).
//! 에러로 빠져나가면 트랜잭션은 drop 되며 모든 쓰기가 버려진다.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::points::PointsEngine;
use super::verifier::{VerificationRequest, VerificationResult, Verifier};
use crate::db::{
    Account, ActivityRecord, LedgerResult, LedgerStore, LedgerTx, RedemptionRecord,
};
use crate::error::LedgerError;
use crate::types::{MaterialType, RecordSource, RecordStatus, Unit};

/// 적립 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    /// 제출 즉시 적립
    Direct,
    /// 관리자 승인 후 적립
    Moderated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    pub mode: LedgerMode,
    pub cooldown: Option<Duration>,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            mode: LedgerMode::Direct,
            cooldown: None,
        }
    }
}

/// 커밋된 기록과 커밋 직후의 계정 상태
#[derive(Debug, Clone)]
pub struct LedgerOutcome<T> {
    pub record: T,
    pub account: Account,
}

/// 수동 입력 적립
#[derive(Debug, Clone)]
pub struct ManualLog {
    pub material: MaterialType,
    pub quantity: f64,
    pub unit: Unit,
}

// ============ Account lifecycle ============

/// 첫 로그인 시 계정 생성. 이미 있으면 그대로 반환
pub async fn ensure_account<S: LedgerStore>(
    store: &S,
    account_id: &str,
    display_name: &str,
    email: Option<&str>,
) -> LedgerResult<Account> {
    let mut tx = store.begin().await?;

    if let Some(existing) = tx.lock_account(account_id).await? {
        return Ok(existing);
    }

    let display_name = sync_display_name(display_name, account_id);
    tx.insert_account(&Account::new(account_id, &display_name, email))
        .await?;

    // 동시 생성에서 진 쪽은 insert가 무시되므로 저장된 행을 다시 읽는다
    let account = lock_existing_account(&mut tx, account_id).await?;
    tx.commit().await?;

    tracing::info!(account_id, "Account created");
    Ok(account)
}

/// 헤더로 받은 이름을 표시 이름 규칙(1-100자)에 맞춘다
fn sync_display_name(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback.chars().take(MAX_DISPLAY_NAME_CHARS).collect();
    }
    trimmed.chars().take(MAX_DISPLAY_NAME_CHARS).collect()
}

const MAX_DISPLAY_NAME_CHARS: usize = 100;

/// 표시 이름 변경
pub async fn update_display_name<S: LedgerStore>(
    store: &S,
    account_id: &str,
    display_name: &str,
) -> LedgerResult<Account> {
    let display_name = display_name.trim();
    if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(LedgerError::Validation(
            "displayName must be 1-100 characters".to_string(),
        ));
    }

    let mut tx = store.begin().await?;
    let mut account = lock_existing_account(&mut tx, account_id).await?;
    account.display_name = display_name.to_string();
    tx.update_account(&account).await?;
    tx.commit().await?;

    Ok(account)
}

/// 사용 가능 포인트를 0으로 초기화 (사용자 요청, 되돌릴 수 없음)
///
/// 누적 포인트는 유지된다.
pub async fn reset_points<S: LedgerStore>(store: &S, account_id: &str) -> LedgerResult<Account> {
    let mut tx = store.begin().await?;
    let mut account = lock_existing_account(&mut tx, account_id).await?;
    let previous = account.total_points;
    account.total_points = 0;
    tx.update_account(&account).await?;
    tx.commit().await?;

    tracing::warn!(account_id, previous, "Spendable points reset to zero");
    Ok(account)
}

// ============ Earn ============

/// 수동 입력 적립
///
/// 수량/단위 검증과 포인트 계산이 먼저 끝나므로 잘못된 입력은 원장에 도달하지 않는다.
pub async fn log_manual<S: LedgerStore>(
    store: &S,
    engine: &PointsEngine,
    policy: &LedgerPolicy,
    owner_id: &str,
    log: &ManualLog,
    now: DateTime<Utc>,
) -> LedgerResult<LedgerOutcome<ActivityRecord>> {
    let points = engine.compute_manual_points(log.material, log.quantity, log.unit)?;

    let record = ActivityRecord {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        material_type: log.material,
        quantity: log.quantity,
        unit: log.unit,
        points_earned: points,
        status: initial_status(policy),
        source: RecordSource::Manual,
        rate_version: engine.rate_version(),
        description: None,
        verifier_comment: None,
        occurred_at: now,
        validated_at: None,
        validated_by: None,
    };

    submit(store, policy, record, now).await
}

/// 사진 검증 적립: oracle 호출 → 포인트 재계산 → 기록
///
/// oracle 호출은 트랜잭션 밖이다. 실패하면 아무것도 쓰지 않는다.
pub async fn log_photo<S: LedgerStore>(
    store: &S,
    verifier: &dyn Verifier,
    engine: &PointsEngine,
    policy: &LedgerPolicy,
    owner_id: &str,
    request: &VerificationRequest,
    now: DateTime<Utc>,
) -> LedgerResult<(LedgerOutcome<ActivityRecord>, VerificationResult)> {
    request.validate()?;
    check_cooldown(store, policy, owner_id, now).await?;

    let verdict = verifier.verify(request).await?;
    let outcome = log_photo_verdict(
        store,
        engine,
        policy,
        owner_id,
        &verdict,
        &request.description,
        now,
    )
    .await?;

    Ok((outcome, verdict))
}

/// 검증 결과를 원장에 반영
///
/// 포인트는 `PointsEngine::compute_photo_verified_points`로만 결정된다.
/// 무효 판정은 0점 `rejected` 기록으로 남아 절대 적립되지 않는다.
pub async fn log_photo_verdict<S: LedgerStore>(
    store: &S,
    engine: &PointsEngine,
    policy: &LedgerPolicy,
    owner_id: &str,
    verdict: &VerificationResult,
    description: &str,
    now: DateTime<Utc>,
) -> LedgerResult<LedgerOutcome<ActivityRecord>> {
    let points = PointsEngine::compute_photo_verified_points(verdict.material, verdict.is_valid);

    if let Some(suggested) = verdict.suggested_points {
        if suggested != points as f64 {
            tracing::warn!(
                owner_id,
                suggested,
                points,
                "Verifier-suggested points overridden"
            );
        }
    }

    let status = if verdict.is_valid {
        initial_status(policy)
    } else {
        RecordStatus::Rejected
    };

    let record = ActivityRecord {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        material_type: verdict.material,
        quantity: 1.0,
        unit: Unit::Item,
        points_earned: points,
        status,
        source: RecordSource::Photo,
        rate_version: engine.rate_version(),
        description: Some(description.to_string()),
        verifier_comment: Some(verdict.comment.clone()),
        occurred_at: now,
        validated_at: None,
        validated_by: None,
    };

    submit(store, policy, record, now).await
}

fn initial_status(policy: &LedgerPolicy) -> RecordStatus {
    match policy.mode {
        LedgerMode::Direct => RecordStatus::Approved,
        LedgerMode::Moderated => RecordStatus::Pending,
    }
}

/// 기록 추가 + (approved면) 잔액 적립 + 마지막 활동 시각 갱신
async fn submit<S: LedgerStore>(
    store: &S,
    policy: &LedgerPolicy,
    record: ActivityRecord,
    now: DateTime<Utc>,
) -> LedgerResult<LedgerOutcome<ActivityRecord>> {
    check_cooldown(store, policy, &record.owner_id, now).await?;

    let mut tx = store.begin().await?;
    let mut account = lock_existing_account(&mut tx, &record.owner_id).await?;

    if record.is_credited() {
        credit(&mut account, record.points_earned);
    }
    account.last_activity_at = Some(now);

    tx.update_account(&account).await?;
    tx.insert_activity(&record).await?;
    tx.commit().await?;

    tracing::info!(
        owner_id = %record.owner_id,
        record_id = %record.id,
        material = %record.material_type,
        points = record.points_earned,
        status = %record.status,
        total_points = account.total_points,
        "Recycling record committed"
    );

    Ok(LedgerOutcome { record, account })
}

/// 제출 간격 제한
///
/// 트랜잭션 전에 stale 데이터로 판단한다. 안전 불변식이 아니라 UX throttle 이다.
pub async fn check_cooldown<S: LedgerStore>(
    store: &S,
    policy: &LedgerPolicy,
    owner_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<()> {
    let Some(cooldown) = policy.cooldown else {
        return Ok(());
    };

    let last = store
        .account(owner_id)
        .await?
        .and_then(|account| account.last_activity_at);

    if let Some(last) = last {
        // 시계가 거꾸로 가면 방금 제출한 것으로 본다
        let elapsed = (now - last).to_std().unwrap_or_default();
        if elapsed < cooldown {
            let remaining = cooldown - elapsed;
            let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(LedgerError::CooldownActive { retry_after_secs });
        }
    }

    Ok(())
}

// ============ Spend ============

/// 리워드 교환
///
/// UI의 잔액 사전 확인은 stale 할 수 있으므로 잠금 후 다시 확인한다.
pub async fn redeem<S: LedgerStore>(
    store: &S,
    owner_id: &str,
    reward_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<LedgerOutcome<RedemptionRecord>> {
    let mut tx = store.begin().await?;

    let reward = tx
        .reward(reward_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound("Reward".to_string()))?;
    let mut account = lock_existing_account(&mut tx, owner_id).await?;

    if account.total_points < reward.required_points {
        return Err(LedgerError::InsufficientBalance {
            required: reward.required_points,
            available: account.total_points,
        });
    }
    account.total_points -= reward.required_points;

    let record = RedemptionRecord {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        reward_id: reward.id.clone(),
        reward_name: reward.name.clone(),
        points_deducted: reward.required_points,
        occurred_at: now,
    };

    tx.update_account(&account).await?;
    tx.insert_redemption(&record).await?;
    tx.commit().await?;

    tracing::info!(
        owner_id,
        reward_id,
        points = record.points_deducted,
        total_points = account.total_points,
        "Reward redeemed"
    );

    Ok(LedgerOutcome { record, account })
}

// ============ Reversal ============

/// 적립 기록 삭제
///
/// 이미 적립된(approved) 기록이면 같은 트랜잭션에서 포인트를 되돌린다 (0 하한).
/// pending/rejected 기록은 잔액 변화 없이 삭제만 한다.
pub async fn delete_activity<S: LedgerStore>(
    store: &S,
    owner_id: &str,
    record_id: Uuid,
) -> LedgerResult<LedgerOutcome<ActivityRecord>> {
    let mut tx = store.begin().await?;

    let record = tx
        .lock_activity(owner_id, record_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound("Recycling record".to_string()))?;
    let mut account = lock_existing_account(&mut tx, owner_id).await?;

    tx.delete_activity(owner_id, record_id).await?;

    if record.is_credited() {
        let points = record.points_earned;
        let (total, total_clamped) = debit_floored(account.total_points, points);
        let (lifetime, lifetime_clamped) = debit_floored(account.lifetime_points, points);

        if total_clamped || lifetime_clamped {
            // 정상 동작에서는 도달하면 안 되는 경로
            tracing::warn!(
                owner_id,
                record_id = %record_id,
                points,
                total_points = account.total_points,
                lifetime_points = account.lifetime_points,
                "Reversal clamped at zero"
            );
        }

        account.total_points = total;
        account.lifetime_points = lifetime;
        tx.update_account(&account).await?;
    }

    tx.commit().await?;

    tracing::info!(
        owner_id,
        record_id = %record_id,
        credited = record.is_credited(),
        total_points = account.total_points,
        "Recycling record deleted"
    );

    Ok(LedgerOutcome { record, account })
}

/// 교환 기록 삭제: 차감했던 포인트를 사용 가능 포인트로 돌려준다
pub async fn delete_redemption<S: LedgerStore>(
    store: &S,
    owner_id: &str,
    redemption_id: Uuid,
) -> LedgerResult<Account> {
    let mut tx = store.begin().await?;

    let record = tx
        .lock_redemption(owner_id, redemption_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound("Redemption".to_string()))?;
    let mut account = lock_existing_account(&mut tx, owner_id).await?;

    account.total_points = account.total_points.saturating_add(record.points_deducted);

    tx.delete_redemption(owner_id, redemption_id).await?;
    tx.update_account(&account).await?;
    tx.commit().await?;

    tracing::info!(
        owner_id,
        redemption_id = %redemption_id,
        points = record.points_deducted,
        total_points = account.total_points,
        "Redemption reversed"
    );

    Ok(account)
}

// ============ Helpers ============

pub(crate) async fn lock_existing_account<T: LedgerTx>(
    tx: &mut T,
    account_id: &str,
) -> LedgerResult<Account> {
    tx.lock_account(account_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound("Account".to_string()))
}

/// 사용 가능/누적 포인트 동시 적립
pub(crate) fn credit(account: &mut Account, points: i64) {
    account.total_points = account.total_points.saturating_add(points);
    account.lifetime_points = account.lifetime_points.saturating_add(points);
}

/// `balance - points`, 0 하한. 두 번째 값은 하한이 적용됐는지
fn debit_floored(balance: i64, points: i64) -> (i64, bool) {
    let next = balance - points;
    if next < 0 {
        (0, true)
    } else {
        (next, false)
    }
}
