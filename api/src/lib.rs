//! Recycle+ Rewards API Library
//!
//! # Overview
//!
//! 재활용 활동을 포인트로 적립하고, 포인트를 리워드로 교환하는 원장(ledger) 백엔드.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!        ┌──────────────┐     ┌────────────────┐
//!        │  PostgreSQL  │     │  AI Verifier   │
//!        └──────────────┘     └────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - 잔액 변경과 기록 추가/삭제는 항상 같은 트랜잭션에서 커밋된다.
//! - `totalPoints`는 음수가 되지 않는다.
//! - 포인트는 서버의 요율표로만 결정된다. 클라이언트나 AI 응답의 숫자는 믿지 않는다.
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (포인트 계산, 원장, 승인, 랭킹)
//! - `db`: 데이터베이스 연동
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recycle_rewards_api::{config::Config, db::Database, create_router, AppState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     let state = AppState::new(db, verifier, config);
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::{ApiError, LedgerError};
pub use services::{LedgerHub, PointsEngine, RankTable, Verifier};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub verifier: Arc<dyn Verifier>,
    pub hub: Arc<LedgerHub>,
    pub engine: Arc<PointsEngine>,
    pub ranks: Arc<RankTable>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, verifier: Arc<dyn Verifier>, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            verifier,
            hub: Arc::new(LedgerHub::new()),
            engine: Arc::new(PointsEngine::default()),
            ranks: Arc::new(RankTable::standard()),
            config: Arc::new(config),
        }
    }
}

/// 라우터 생성 (미들웨어 제외)
///
/// # Route Structure
///
/// ```text
/// GET    /health                               - 서버 상태 확인
///
/// POST   /account/sync                         - 첫 로그인 계정 생성
/// GET    /account                              - 잔액 + 등급
/// PATCH  /account/profile                      - 표시 이름 변경
/// POST   /account/reset                        - 사용 가능 포인트 초기화
/// GET    /account/rank                         - 등급 진행률
/// GET    /account/activity                     - 최근 활동 피드
/// GET    /account/stats                        - 소재별/일별 통계
///
/// GET    /recycling                            - 적립 히스토리
/// POST   /recycling/manual                     - 수동 입력 적립
/// POST   /recycling/photo                      - 사진 검증 적립
/// DELETE /recycling/:id                        - 적립 취소
///
/// GET    /rewards                              - 리워드 카탈로그
/// POST   /rewards/:id/redeem                   - 리워드 교환
/// GET    /redemptions                          - 교환 히스토리
/// DELETE /redemptions/:id                      - 교환 취소
///
/// GET    /leaderboard                          - 누적 포인트 랭킹
///
/// GET    /admin/records                        - 검증 큐
/// POST   /admin/records/:owner_id/:id/approve  - 승인
/// POST   /admin/records/:owner_id/:id/reject   - 거절
/// POST   /admin/bootstrap                      - 첫 관리자 등록
/// POST   /admin/roles/:user_id                 - 관리자 권한 부여
///
/// GET    /ws                                   - 실시간 잔액
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Account
        .route("/account", get(routes::account::get_account))
        .route("/account/sync", post(routes::account::sync_account))
        .route("/account/profile", patch(routes::account::update_profile))
        .route("/account/reset", post(routes::account::reset_points))
        .route("/account/rank", get(routes::account::get_rank))
        .route("/account/activity", get(routes::account::get_activity_feed))
        .route("/account/stats", get(routes::account::get_stats))

        // Recycling
        .route("/recycling", get(routes::recycling::list_records))
        .route("/recycling/manual", post(routes::recycling::log_manual))
        .route("/recycling/photo", post(routes::recycling::log_photo))
        .route("/recycling/:id", delete(routes::recycling::delete_record))

        // Rewards
        .route("/rewards", get(routes::rewards::list_rewards))
        .route("/rewards/:id/redeem", post(routes::rewards::redeem_reward))
        .route("/redemptions", get(routes::rewards::list_redemptions))
        .route("/redemptions/:id", delete(routes::rewards::delete_redemption))

        // Leaderboard
        .route("/leaderboard", get(routes::leaderboard::get_leaderboard))

        // Admin
        .route("/admin/records", get(routes::admin::list_records))
        .route(
            "/admin/records/:owner_id/:id/approve",
            post(routes::admin::approve_record),
        )
        .route(
            "/admin/records/:owner_id/:id/reject",
            post(routes::admin::reject_record),
        )
        .route("/admin/bootstrap", post(routes::admin::bootstrap))
        .route("/admin/roles/:user_id", post(routes::admin::grant_role))

        // WebSocket
        .route("/ws", get(routes::ws::ws_handler))

        // 상태 주입
        .with_state(state)
}
