//! Ledger live updates
//!
//! 커밋된 원장 변경을 WebSocket 클라이언트에 밀어준다.
//!
//! # Channels
//! - 사용자별 채널: 본인 잔액 변경 (`BalanceUpdate`)
//! - 전역 채널: 누적 포인트가 바뀌어 리더보드가 달라졌을 수 있음 (`LeaderboardChanged`)
//!
//! 발행은 커밋 이후에만 일어나고 실패해도 무시된다 (수신자가 없으면 send가 Err).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::db::Account;

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    BalanceUpdate(BalanceUpdate),
    LeaderboardChanged(LeaderboardChanged),
    Error(WsError),
    Pong,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdate {
    pub account_id: String,
    pub total_points: i64,
    pub lifetime_points: i64,
    pub timestamp: DateTime<Utc>,
}

impl BalanceUpdate {
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            total_points: account.total_points,
            lifetime_points: account.lifetime_points,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardChanged {
    pub account_id: String,
    pub lifetime_points: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsError {
    pub code: i32,
    pub message: String,
}

/// LedgerHub
///
/// ```text
/// ledger commit ──▶ LedgerHub ──▶ user channel (owner only)
///                            └──▶ global channel (everyone)
/// ```
pub struct LedgerHub {
    global_tx: broadcast::Sender<WsMessage>,
    user_channels: Arc<RwLock<HashMap<String, broadcast::Sender<WsMessage>>>>,
}

impl LedgerHub {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(1000);

        Self {
            global_tx,
            user_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 커밋 직후 계정 상태 발행
    ///
    /// `lifetime_changed`면 리더보드 변경도 함께 알린다.
    pub async fn publish(&self, account: &Account, lifetime_changed: bool) {
        {
            let channels = self.user_channels.read().await;
            if let Some(tx) = channels.get(&account.id) {
                let _ = tx.send(WsMessage::BalanceUpdate(BalanceUpdate::from_account(account)));
            }
        }

        if lifetime_changed {
            let _ = self
                .global_tx
                .send(WsMessage::LeaderboardChanged(LeaderboardChanged {
                    account_id: account.id.clone(),
                    lifetime_points: account.lifetime_points,
                    timestamp: Utc::now(),
                }));
        }
    }

    pub fn subscribe_global(&self) -> broadcast::Receiver<WsMessage> {
        self.global_tx.subscribe()
    }

    /// 사용자 채널 구독 (없으면 생성)
    pub async fn subscribe_user(&self, account_id: &str) -> broadcast::Receiver<WsMessage> {
        let mut channels = self.user_channels.write().await;

        let tx = channels.entry(account_id.to_string()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(100);
            tx
        });

        tx.subscribe()
    }

    /// 구독자가 모두 떠난 사용자 채널 정리
    pub async fn release_user(&self, account_id: &str) {
        let mut channels = self.user_channels.write().await;
        if channels
            .get(account_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(account_id);
        }
    }

    /// 사용자 채널 수
    pub async fn active_users(&self) -> usize {
        self.user_channels.read().await.len()
    }
}

impl Default for LedgerHub {
    fn default() -> Self {
        Self::new()
    }
}

/// 클라이언트 → 서버 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    Ping,
}

pub fn parse_client_message(data: &str) -> Result<ClientMessage> {
    serde_json::from_str(data).map_err(Into::into)
}

pub fn serialize_message(msg: &WsMessage) -> Result<String> {
    serde_json::to_string(msg).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str, total: i64, lifetime: i64) -> Account {
        let mut account = Account::new(id, id, None);
        account.total_points = total;
        account.lifetime_points = lifetime;
        account
    }

    #[tokio::test]
    async fn test_balance_update_reaches_owner_only() {
        let hub = LedgerHub::new();
        let mut mine = hub.subscribe_user("u1").await;
        let mut theirs = hub.subscribe_user("u2").await;

        hub.publish(&account("u1", 20, 120), false).await;

        match mine.recv().await {
            Ok(WsMessage::BalanceUpdate(update)) => {
                assert_eq!(update.account_id, "u1");
                assert_eq!(update.total_points, 20);
                assert_eq!(update.lifetime_points, 120);
            }
            other => panic!("Expected BalanceUpdate, got {:?}", other),
        }
        assert!(theirs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leaderboard_notice_only_when_lifetime_changes() {
        let hub = LedgerHub::new();
        let mut global = hub.subscribe_global();

        // 교환: 사용 가능 포인트만 변함
        hub.publish(&account("u1", 0, 20), false).await;
        assert!(global.try_recv().is_err());

        hub.publish(&account("u1", 20, 40), true).await;
        match global.recv().await {
            Ok(WsMessage::LeaderboardChanged(notice)) => {
                assert_eq!(notice.lifetime_points, 40);
            }
            other => panic!("Expected LeaderboardChanged, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = LedgerHub::new();
        hub.publish(&account("ghost", 1, 1), true).await;
        assert_eq!(hub.active_users().await, 0);
    }

    #[tokio::test]
    async fn test_release_user_after_last_receiver() {
        let hub = LedgerHub::new();
        let rx = hub.subscribe_user("u1").await;
        hub.release_user("u1").await;
        assert_eq!(hub.active_users().await, 1);

        drop(rx);
        hub.release_user("u1").await;
        assert_eq!(hub.active_users().await, 0);
    }

    #[test]
    fn test_message_serialization() {
        let msg = WsMessage::BalanceUpdate(BalanceUpdate::from_account(&account("u1", 5, 9)));
        let json = serialize_message(&msg).unwrap();
        assert!(json.contains(r#""type":"BalanceUpdate""#));
        assert!(json.contains(r#""totalPoints":5"#));
    }

    #[test]
    fn test_client_message_parsing() {
        let msg = parse_client_message(r#"{"action":"Ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
        assert!(parse_client_message(r#"{"action":"Subscribe"}"#).is_err());
    }
}
