//! Recycling Verification Client
//!
//! 외부 생성형 AI 엔드포인트에 사진 + 설명을 보내 `{isValid, material, comment}`를 받는다.
//!
//! - 느리고(수 초) 비결정적인 호출이다. 재시도는 하지 않고 실패를 그대로 돌려준다.
//! - 응답의 `points`는 참고용으로만 파싱한다. 실제 포인트는 PointsEngine이 다시 계산한다.
//! - 호출은 항상 트랜잭션 밖에서 일어나므로 실패해도 잔액은 그대로다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::MaterialType;

/// 설명 최대 길이
const MAX_DESCRIPTION_LEN: usize = 1000;

/// 검증 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    /// `data:<mimetype>;base64,<encoded_data>`
    pub photo_data_uri: String,
    pub description: String,
}

impl VerificationRequest {
    /// 외부 호출 전에 끝내는 형식 검증
    pub fn validate(&self) -> Result<(), LedgerError> {
        let header = self
            .photo_data_uri
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"));

        match header {
            Some((mime, payload)) if !mime.is_empty() && !payload.is_empty() => {}
            _ => {
                return Err(LedgerError::Validation(
                    "photoDataUri must be a base64 data URI".to_string(),
                ))
            }
        }

        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::Validation(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }

        Ok(())
    }
}

/// 검증 결과 (신뢰하지 않는 oracle 응답)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_valid: bool,

    #[serde(alias = "materialType")]
    pub material: MaterialType,

    #[serde(default)]
    pub comment: String,

    /// oracle이 스스로 매긴 포인트. 무시된다
    #[serde(default, rename = "points", skip_serializing)]
    pub suggested_points: Option<f64>,
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest)
        -> Result<VerificationResult, LedgerError>;
}

/// HTTP(JSON) 검증 클라이언트
pub struct HttpVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVerifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build verifier HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResult, LedgerError> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                tracing::warn!("Verification request failed: {}", e);
                LedgerError::Transient(format!("verification endpoint unreachable: {}", e))
            })?;

        let result: VerificationResult = response.json().await.map_err(|e| {
            tracing::warn!("Verification response malformed: {}", e);
            LedgerError::Transient(format!("malformed verification response: {}", e))
        })?;

        tracing::debug!(
            is_valid = result.is_valid,
            material = %result.material,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Verification completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 고정 응답 (또는 실패)을 돌려주는 검증기
    pub struct StaticVerifier {
        result: Result<VerificationResult, LedgerError>,
        pub calls: AtomicUsize,
    }

    impl StaticVerifier {
        pub fn returning(is_valid: bool, material: MaterialType, suggested_points: f64) -> Self {
            Self {
                result: Ok(VerificationResult {
                    is_valid,
                    material,
                    comment: "ok".to_string(),
                    suggested_points: Some(suggested_points),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                result: Err(LedgerError::Transient("endpoint down".to_string())),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Verifier for StaticVerifier {
        async fn verify(
            &self,
            _request: &VerificationRequest,
        ) -> Result<VerificationResult, LedgerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use tokio::net::TcpListener;

    fn request(uri: &str) -> VerificationRequest {
        VerificationRequest {
            photo_data_uri: uri.to_string(),
            description: "garrafas pet".to_string(),
        }
    }

    /// 임의 포트에 고정 JSON을 돌려주는 서버를 띄운다
    async fn start_mock_endpoint(body: serde_json::Value) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().route(
            "/verify",
            post(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/verify", addr)
    }

    #[test]
    fn test_validate_data_uri() {
        assert!(request("data:image/jpeg;base64,/9j/4AAQ").validate().is_ok());
        assert!(request("http://example.com/cat.jpg").validate().is_err());
        assert!(request("data:;base64,abc").validate().is_err());
        assert!(request("data:image/png;base64,").validate().is_err());
    }

    #[test]
    fn test_validate_description_length() {
        let mut req = request("data:image/jpeg;base64,/9j/4AAQ");
        req.description = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(matches!(req.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_result_parsing_is_lenient() {
        let json = r#"{"isValid":true,"materialType":"Isopor","points":999}"#;
        let result: VerificationResult = serde_json::from_str(json).unwrap();

        assert!(result.is_valid);
        assert_eq!(result.material, MaterialType::Outros);
        assert_eq!(result.suggested_points, Some(999.0));
        assert_eq!(result.comment, "");
    }

    #[tokio::test]
    async fn test_http_verifier_parses_response() {
        let url = start_mock_endpoint(serde_json::json!({
            "isValid": true,
            "material": "Metal",
            "points": 1000,
            "comment": "Latinhas verificadas."
        }))
        .await;

        let verifier = HttpVerifier::new(&url, Duration::from_secs(5)).unwrap();
        let result = verifier
            .verify(&request("data:image/jpeg;base64,/9j/4AAQ"))
            .await
            .unwrap();

        assert!(result.is_valid);
        assert_eq!(result.material, MaterialType::Metal);
        assert_eq!(result.comment, "Latinhas verificadas.");
    }

    #[tokio::test]
    async fn test_http_verifier_unreachable_is_transient() {
        // 아무도 listen 하지 않는 포트
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let verifier =
            HttpVerifier::new(&format!("http://{}/verify", addr), Duration::from_secs(2)).unwrap();
        let err = verifier
            .verify(&request("data:image/jpeg;base64,/9j/4AAQ"))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
