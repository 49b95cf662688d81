//! Health Check Endpoint
//!
//! 로드밸런서/오케스트레이터용. DB까지 실제로 질의하는 deep health check.
//! 검증 엔드포인트는 호출 비용이 크므로 설정된 URL만 보고한다.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::types::{MaterialType, Unit};
use crate::AppState;

/// Health check 응답
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub ledger: LedgerStatus,
    pub timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatus {
    pub mode: String,
    pub rate_version: i32,
    pub cooldown_secs: Option<u64>,
    pub verifier_url: String,
    /// 소재별 지원 단위
    pub supported_units: BTreeMap<String, Vec<Unit>>,
}

/// GET /health
///
/// 서버 및 의존성 상태 확인
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_start = std::time::Instant::now();
    let db_status = match state.db.health_check().await {
        Ok(_) => DatabaseStatus {
            connected: true,
            latency_ms: Some(db_start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            DatabaseStatus {
                connected: false,
                latency_ms: None,
            }
        }
    };

    let policy = state.config.ledger_policy();
    let ledger = LedgerStatus {
        mode: format!("{:?}", policy.mode).to_lowercase(),
        rate_version: state.engine.rate_version(),
        cooldown_secs: policy.cooldown.map(|c| c.as_secs()),
        verifier_url: state.config.verifier_url.clone(),
        supported_units: MaterialType::ALL
            .iter()
            .map(|m| (m.to_string(), state.engine.rates().supported_units(*m)))
            .collect(),
    };

    Json(HealthResponse {
        status: if db_status.connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
        ledger,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
