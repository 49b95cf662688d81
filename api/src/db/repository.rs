//! Ledger storage seam
//!
//! 원장 연산은 "트랜잭션 시작 → 읽기 → 조건부 쓰기 → 커밋" 한 가지 모양뿐이다.
//! 그 모양을 trait 두 개로 표현한다.
//!
//! - `LedgerStore::begin()`: 트랜잭션 시작
//! - `LedgerTx`: 트랜잭션 안에서의 타입 있는 읽기/쓰기 + `commit`
//!
//! `commit` 없이 drop된 트랜잭션은 모든 쓰기를 버린다 (all-or-nothing).
//! `lock_*` 읽기는 커밋/롤백까지 같은 행에 대한 다른 트랜잭션을 막는다.
//!
//! PostgreSQL 구현은 `db/transaction.rs`, 테스트용 in-memory 구현은 아래 `mock`.

use async_trait::async_trait;
use uuid::Uuid;

use super::models::{Account, ActivityRecord, RedemptionRecord, Reward};
use crate::error::LedgerError;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTx;

    async fn begin(&self) -> LedgerResult<Self::Tx>;

    /// 트랜잭션 밖 조회 (stale 가능). cooldown 같은 UX 판단에만 사용
    async fn account(&self, id: &str) -> LedgerResult<Option<Account>>;
}

#[async_trait]
pub trait LedgerTx: Send {
    // ============ Account ============
    async fn lock_account(&mut self, id: &str) -> LedgerResult<Option<Account>>;
    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()>;
    /// 잔액, 누적 포인트, 마지막 활동 시각, 표시 이름 저장
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    // ============ Recycling records ============
    async fn lock_activity(&mut self, owner_id: &str, id: Uuid)
        -> LedgerResult<Option<ActivityRecord>>;
    async fn insert_activity(&mut self, record: &ActivityRecord) -> LedgerResult<()>;
    /// status, validated_at, validated_by 저장
    async fn update_activity_status(&mut self, record: &ActivityRecord) -> LedgerResult<()>;
    async fn delete_activity(&mut self, owner_id: &str, id: Uuid) -> LedgerResult<()>;

    // ============ Redemptions ============
    async fn lock_redemption(&mut self, owner_id: &str, id: Uuid)
        -> LedgerResult<Option<RedemptionRecord>>;
    async fn insert_redemption(&mut self, record: &RedemptionRecord) -> LedgerResult<()>;
    async fn delete_redemption(&mut self, owner_id: &str, id: Uuid) -> LedgerResult<()>;

    // ============ Catalog / roles ============
    async fn reward(&mut self, id: &str) -> LedgerResult<Option<Reward>>;
    async fn is_admin(&mut self, account_id: &str) -> LedgerResult<bool>;
    /// 관리자 테이블을 잠그고 현재 관리자 수 반환 (bootstrap 경쟁 방지)
    async fn lock_admin_roles(&mut self) -> LedgerResult<i64>;
    async fn grant_admin(&mut self, account_id: &str, granted_by: Option<&str>)
        -> LedgerResult<()>;

    async fn commit(self) -> LedgerResult<()>;
}

#[cfg(test)]
pub mod mock {
    //! In-memory `LedgerStore`.
    //!
    //! 트랜잭션은 전역 mutex를 잡고 상태 사본에 쓴 뒤, commit 시 교체한다.
    //! 동시 트랜잭션은 완전히 직렬화되므로 lost update가 있다면 서비스 로직 탓이다.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    #[derive(Debug, Clone, Default)]
    pub struct MemoryState {
        pub accounts: HashMap<String, Account>,
        pub activities: HashMap<Uuid, ActivityRecord>,
        pub redemptions: HashMap<Uuid, RedemptionRecord>,
        pub rewards: HashMap<String, Reward>,
        pub admins: HashSet<String>,
    }

    #[derive(Clone, Default)]
    pub struct MemoryStore {
        state: Arc<Mutex<MemoryState>>,
        fail_next_commit: Arc<AtomicBool>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn seed_account(&self, id: &str, total_points: i64, lifetime_points: i64) {
            let mut account = Account::new(id, id, None);
            account.total_points = total_points;
            account.lifetime_points = lifetime_points;
            self.state.lock().await.accounts.insert(id.to_string(), account);
        }

        pub async fn seed_reward(&self, id: &str, name: &str, required_points: i64) {
            self.state.lock().await.rewards.insert(
                id.to_string(),
                Reward {
                    id: id.to_string(),
                    name: name.to_string(),
                    description: String::new(),
                    required_points,
                    image_ref: None,
                },
            );
        }

        pub async fn seed_admin(&self, id: &str) {
            self.state.lock().await.admins.insert(id.to_string());
        }

        /// 다음 commit을 Transient 에러로 실패시킴
        pub fn fail_next_commit(&self) {
            self.fail_next_commit.store(true, Ordering::SeqCst);
        }

        pub async fn snapshot(&self) -> MemoryState {
            self.state.lock().await.clone()
        }
    }

    pub struct MemoryTx {
        guard: OwnedMutexGuard<MemoryState>,
        staged: MemoryState,
        fail_commit: bool,
    }

    #[async_trait]
    impl LedgerStore for MemoryStore {
        type Tx = MemoryTx;

        async fn begin(&self) -> LedgerResult<MemoryTx> {
            let guard = self.state.clone().lock_owned().await;
            let staged = guard.clone();
            let fail_commit = self.fail_next_commit.swap(false, Ordering::SeqCst);
            Ok(MemoryTx {
                guard,
                staged,
                fail_commit,
            })
        }

        async fn account(&self, id: &str) -> LedgerResult<Option<Account>> {
            Ok(self.state.lock().await.accounts.get(id).cloned())
        }
    }

    #[async_trait]
    impl LedgerTx for MemoryTx {
        async fn lock_account(&mut self, id: &str) -> LedgerResult<Option<Account>> {
            // 다른 태스크에게 양보해서 interleaving 기회를 준다
            tokio::task::yield_now().await;
            Ok(self.staged.accounts.get(id).cloned())
        }

        async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
            self.staged
                .accounts
                .entry(account.id.clone())
                .or_insert_with(|| account.clone());
            Ok(())
        }

        async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
            if account.total_points < 0 {
                return Err(LedgerError::InsufficientBalance {
                    required: -account.total_points,
                    available: 0,
                });
            }
            match self.staged.accounts.get_mut(&account.id) {
                Some(existing) => {
                    *existing = account.clone();
                    Ok(())
                }
                None => Err(LedgerError::NotFound("Account".to_string())),
            }
        }

        async fn lock_activity(
            &mut self,
            owner_id: &str,
            id: Uuid,
        ) -> LedgerResult<Option<ActivityRecord>> {
            Ok(self
                .staged
                .activities
                .get(&id)
                .filter(|r| r.owner_id == owner_id)
                .cloned())
        }

        async fn insert_activity(&mut self, record: &ActivityRecord) -> LedgerResult<()> {
            self.staged.activities.insert(record.id, record.clone());
            Ok(())
        }

        async fn update_activity_status(&mut self, record: &ActivityRecord) -> LedgerResult<()> {
            match self.staged.activities.get_mut(&record.id) {
                Some(existing) => {
                    existing.status = record.status;
                    existing.validated_at = record.validated_at;
                    existing.validated_by = record.validated_by.clone();
                    Ok(())
                }
                None => Err(LedgerError::NotFound("Recycling record".to_string())),
            }
        }

        async fn delete_activity(&mut self, _owner_id: &str, id: Uuid) -> LedgerResult<()> {
            self.staged.activities.remove(&id);
            Ok(())
        }

        async fn lock_redemption(
            &mut self,
            owner_id: &str,
            id: Uuid,
        ) -> LedgerResult<Option<RedemptionRecord>> {
            Ok(self
                .staged
                .redemptions
                .get(&id)
                .filter(|r| r.owner_id == owner_id)
                .cloned())
        }

        async fn insert_redemption(&mut self, record: &RedemptionRecord) -> LedgerResult<()> {
            self.staged.redemptions.insert(record.id, record.clone());
            Ok(())
        }

        async fn delete_redemption(&mut self, _owner_id: &str, id: Uuid) -> LedgerResult<()> {
            self.staged.redemptions.remove(&id);
            Ok(())
        }

        async fn reward(&mut self, id: &str) -> LedgerResult<Option<Reward>> {
            Ok(self.staged.rewards.get(id).cloned())
        }

        async fn is_admin(&mut self, account_id: &str) -> LedgerResult<bool> {
            Ok(self.staged.admins.contains(account_id))
        }

        async fn lock_admin_roles(&mut self) -> LedgerResult<i64> {
            Ok(self.staged.admins.len() as i64)
        }

        async fn grant_admin(
            &mut self,
            account_id: &str,
            _granted_by: Option<&str>,
        ) -> LedgerResult<()> {
            self.staged.admins.insert(account_id.to_string());
            Ok(())
        }

        async fn commit(mut self) -> LedgerResult<()> {
            if self.fail_commit {
                return Err(LedgerError::Transient("injected commit failure".to_string()));
            }
            *self.guard = self.staged;
            Ok(())
        }
    }
}
