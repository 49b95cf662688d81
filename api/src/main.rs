//! Recycle+ Rewards API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Client (Frontend) + Auth Proxy               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  x-user-id / x-user-name / x-user-email
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /account/*  /recycling/*  /rewards/*  /admin/*  /ws    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  PointsEngine    Ledger    Approval    Ranking   Hub    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL (SELECT ... FOR UPDATE transactions)        ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              AI Recycling Verifier (HTTP, JSON)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recycle_rewards_api::{
    create_router, routes, services::HttpVerifier, AppState, Config, Database,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recycle_rewards_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Recycle+ Rewards API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!(
        mode = ?config.ledger_mode,
        cooldown = ?config.cooldown,
        "📋 Configuration loaded"
    );

    // 데이터베이스 연결
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("🗄️  Database connected");

    // 마이그레이션 실행
    db.run_migrations().await?;
    tracing::info!("📦 Migrations completed");

    // 서비스 초기화
    let verifier = HttpVerifier::new(&config.verifier_url, config.verifier_timeout)?;
    tracing::info!("🤖 Verifier endpoint: {}", verifier.endpoint());

    let cors = cors_layer(&config);
    let port = config.port;

    // 앱 상태 구성
    let state = AppState::new(db, Arc::new(verifier), config);

    // 라우터 구성 + 미들웨어
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS 설정
///
/// 프로덕션에서는 `ALLOWED_ORIGINS`만 허용, 개발 환경에서는 로컬 dev 서버 허용
fn cors_layer(config: &Config) -> CorsLayer {
    let identity_headers = [
        header::CONTENT_TYPE,
        HeaderName::from_static(routes::USER_ID_HEADER),
        HeaderName::from_static(routes::USER_NAME_HEADER),
        HeaderName::from_static(routes::USER_EMAIL_HEADER),
    ];

    if config.is_production() {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        if origins.is_empty() {
            tracing::warn!("ALLOWED_ORIGINS is empty; cross-origin requests will be rejected");
        }

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers(identity_headers)
    } else {
        // 개발: localhost 허용
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:9002"), // Next.js dev server
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:9002"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
