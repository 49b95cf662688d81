//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! `LedgerError` is the domain taxonomy returned by every ledger operation;
//! `ApiError` is what handlers return and what the client sees.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 원장(ledger) 연산 에러
///
/// 호출자는 메시지 문자열이 아니라 variant로 분기한다.
/// 어떤 variant든 반환되면 트랜잭션은 커밋되지 않은 상태다.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// 잘못된 입력 (수량 <= 0, 필수 필드 누락 등). 원장에 도달하지 않음
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 계정/기록이 트랜잭션 도중 사라짐
    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    /// 이미 승인/거절된 기록에 대한 재전이
    #[error("Record already processed ({0})")]
    AlreadyProcessed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// 제출 간격 제한 (UX throttle)
    #[error("Cooldown active, retry after {retry_after_secs}s")]
    CooldownActive { retry_after_secs: u64 },

    /// DB 또는 검증 엔드포인트 일시 장애. 수동 재시도 안전
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Transient(_))
    }
}

/// SQLx 에러를 LedgerError로 변환
///
/// Postgres SQLSTATE 기준:
/// - 40001 serialization_failure / 40P01 deadlock_detected → Transient
/// - 42501 insufficient_privilege → PermissionDenied
/// - 23514 check_violation (total_points >= 0) → InsufficientBalance
impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => LedgerError::Transient(err.to_string()),
            sqlx::Error::RowNotFound => LedgerError::NotFound("Row".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => LedgerError::Transient(err.to_string()),
                Some("42501") => LedgerError::PermissionDenied(db_err.message().to_string()),
                Some("23514") => LedgerError::InsufficientBalance {
                    required: 0,
                    available: 0,
                },
                _ => {
                    tracing::error!("SQLx database error: {:?}", err);
                    LedgerError::Storage(err.to_string())
                }
            },
            _ => {
                tracing::error!("SQLx error: {:?}", err);
                LedgerError::Storage(err.to_string())
            }
        }
    }
}

/// API 에러 타입
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx
/// - 서버 에러: 5xx (내부 정보는 노출하지 않음)
#[derive(Debug, Error)]
pub enum ApiError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ============ 401 Unauthorized ============
    #[error("Authentication required")]
    Unauthorized,

    // ============ 403 Forbidden ============
    #[error("Permission denied: {0}")]
    Forbidden(String),

    // ============ 404 Not Found ============
    #[error("Resource not found: {0}")]
    NotFound(String),

    // ============ 409 Conflict ============
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    // ============ 429 Too Many Requests ============
    #[error("Cooldown active")]
    CooldownActive { retry_after_secs: u64 },

    // ============ 500 Internal Server Error ============
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error")]
    InternalError,

    // ============ 503 Service Unavailable ============
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // 4xx 클라이언트 에러
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "You are not authorized to perform this action".to_string(),
                Some(msg.clone()),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                None,
            ),
            ApiError::InsufficientBalance { required, available } => (
                StatusCode::CONFLICT,
                "INSUFFICIENT_BALANCE",
                "Insufficient points".to_string(),
                Some(format!("required {}, available {}", required, available)),
            ),
            ApiError::AlreadyProcessed(status) => (
                StatusCode::CONFLICT,
                "ALREADY_PROCESSED",
                "Record was already processed".to_string(),
                Some(status.clone()),
            ),
            ApiError::CooldownActive { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "COOLDOWN_ACTIVE",
                "Please wait before submitting again".to_string(),
                Some(format!("retry after {}s", retry_after_secs)),
            ),

            // 5xx 서버 에러
            ApiError::DatabaseError(_) => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Database error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                    None,
                )
            }
            ApiError::InternalError => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(service) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                format!("{} is currently unavailable", service),
                None,
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// 도메인 에러 → HTTP 에러
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => ApiError::ValidationError(msg),
            LedgerError::NotFound(what) => ApiError::NotFound(what),
            LedgerError::InsufficientBalance { required, available } => {
                ApiError::InsufficientBalance { required, available }
            }
            LedgerError::AlreadyProcessed(status) => ApiError::AlreadyProcessed(status),
            LedgerError::PermissionDenied(msg) => ApiError::Forbidden(msg),
            LedgerError::CooldownActive { retry_after_secs } => {
                ApiError::CooldownActive { retry_after_secs }
            }
            LedgerError::Transient(msg) => ApiError::ServiceUnavailable(msg),
            LedgerError::Storage(msg) => ApiError::DatabaseError(msg),
        }
    }
}

/// SQLx 에러를 ApiError로 변환 (조회 전용 경로)
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::from(err).into()
    }
}

/// anyhow 에러를 ApiError로 변환
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        ApiError::InternalError
    }
}
