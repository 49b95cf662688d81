//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//!
//! Enum 값은 DB 컬럼과 JSON 양쪽에서 그대로 쓰이는 "wire format"이므로
//! 이름을 바꾸면 기존 데이터와 클라이언트가 깨진다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 재활용 소재 종류
///
/// 알 수 없는 값은 에러가 아니라 `Outros`로 매핑된다 (항상 적립 가능한 최하위 등급).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(from = "String")]
#[sqlx(type_name = "text")]
pub enum MaterialType {
    #[serde(rename = "Plástico")]
    #[sqlx(rename = "Plástico")]
    Plastico,
    #[serde(rename = "Papel")]
    #[sqlx(rename = "Papel")]
    Papel,
    #[serde(rename = "Vidro")]
    #[sqlx(rename = "Vidro")]
    Vidro,
    #[serde(rename = "Metal")]
    #[sqlx(rename = "Metal")]
    Metal,
    #[serde(rename = "Outros")]
    #[sqlx(rename = "Outros")]
    Outros,
}

impl MaterialType {
    pub const ALL: [MaterialType; 5] = [
        MaterialType::Plastico,
        MaterialType::Papel,
        MaterialType::Vidro,
        MaterialType::Metal,
        MaterialType::Outros,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Plastico => "Plástico",
            MaterialType::Papel => "Papel",
            MaterialType::Vidro => "Vidro",
            MaterialType::Metal => "Metal",
            MaterialType::Outros => "Outros",
        }
    }

    /// 관대한 파싱: 대소문자/악센트 없는 표기도 허용, 나머지는 Outros
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "plástico" | "plastico" => MaterialType::Plastico,
            "papel" => MaterialType::Papel,
            "vidro" => MaterialType::Vidro,
            "metal" => MaterialType::Metal,
            _ => MaterialType::Outros,
        }
    }
}

impl From<String> for MaterialType {
    fn from(value: String) -> Self {
        MaterialType::parse_lenient(&value)
    }
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 수량 단위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum Unit {
    /// 그램
    #[serde(rename = "gm")]
    #[sqlx(rename = "gm")]
    Gram,
    /// 개수
    #[serde(rename = "unidades")]
    #[sqlx(rename = "unidades")]
    Item,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Gram => "gm",
            Unit::Item => "unidades",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 적립 기록의 승인 상태
///
/// `pending`에서만 전이 가능, `approved`/`rejected`는 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Approved => "approved",
            RecordStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 적립 기록의 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RecordSource {
    /// 수량 직접 입력
    Manual,
    /// AI 사진 검증
    Photo,
}

/// 계정 ID (identity provider의 subject id)
///
/// 형식은 provider마다 다르므로 길이와 문자 집합만 검증
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    const MAX_LEN: usize = 128;

    pub fn new(id: &str) -> Result<Self, String> {
        let id = id.trim();
        if id.is_empty() || id.len() > Self::MAX_LEN {
            return Err("Invalid account id length".to_string());
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '|'))
        {
            return Err("Invalid account id format".to_string());
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_wire_names() {
        let json = serde_json::to_string(&MaterialType::Plastico).unwrap();
        assert_eq!(json, "\"Plástico\"");

        let parsed: MaterialType = serde_json::from_str("\"Metal\"").unwrap();
        assert_eq!(parsed, MaterialType::Metal);
    }

    #[test]
    fn test_unknown_material_maps_to_outros() {
        let parsed: MaterialType = serde_json::from_str("\"Isopor\"").unwrap();
        assert_eq!(parsed, MaterialType::Outros);

        assert_eq!(MaterialType::parse_lenient("plastico"), MaterialType::Plastico);
        assert_eq!(MaterialType::parse_lenient(" VIDRO "), MaterialType::Vidro);
    }

    #[test]
    fn test_unit_wire_names() {
        let unit: Unit = serde_json::from_str("\"unidades\"").unwrap();
        assert_eq!(unit, Unit::Item);
        assert!(serde_json::from_str::<Unit>("\"kg\"").is_err());
    }

    #[test]
    fn test_status_terminal() {
        assert!(!RecordStatus::Pending.is_terminal());
        assert!(RecordStatus::Approved.is_terminal());
        assert!(RecordStatus::Rejected.is_terminal());
        assert_eq!(serde_json::to_string(&RecordStatus::Approved).unwrap(), "\"approved\"");
    }

    #[test]
    fn test_account_id_valid() {
        assert!(AccountId::new("Xy9kQ2abc_DEF-123").is_ok());
        assert!(AccountId::new("google-oauth2|10987").is_ok());
    }

    #[test]
    fn test_account_id_invalid() {
        assert!(AccountId::new("").is_err());
        assert!(AccountId::new("has space").is_err());
        assert!(AccountId::new(&"a".repeat(200)).is_err());
    }
}
