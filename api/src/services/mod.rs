//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `PointsEngine`: 소재/수량 → 포인트 (순수 함수)
//! - `ledger`: 잔액 + 기록 트랜잭션 (적립, 교환, 취소)
//! - `approval`: pending 기록 승인/거절
//! - `ranking`: 등급, 리더보드
//! - `stats`: 대시보드 집계
//! - `Verifier`: 사진 검증 외부 호출
//! - `LedgerHub`: WebSocket 실시간 잔액

pub mod approval;
pub mod ledger;
mod notifier;
mod points;
mod ranking;
pub mod stats;
mod verifier;

pub use approval::Decision;
pub use ledger::{LedgerMode, LedgerOutcome, LedgerPolicy, ManualLog};
pub use notifier::{
    parse_client_message, serialize_message, BalanceUpdate, ClientMessage, LeaderboardChanged,
    LedgerHub, WsError, WsMessage,
};
pub use points::{PointsEngine, RateTable};
pub use ranking::{project_leaderboard, LeaderboardEntry, RankProgress, RankTable, Tier};
pub use stats::{AccountStats, FeedItem};
pub use verifier::{HttpVerifier, VerificationRequest, VerificationResult, Verifier};

#[cfg(test)]
pub use verifier::mock as verifier_mock;
