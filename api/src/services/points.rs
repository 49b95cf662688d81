//! Points Engine
//!
//! 적립 포인트를 결정하는 유일한 곳. 클라이언트나 AI가 보낸 포인트 값은 믿지 않고
//! 항상 여기 요율표로 다시 계산한다.
//!
//! 요율은 milli-point 정수로 보관한다 (0.015/gm → 15). 정수 수량이면 곱셈이
//! 정확하므로 반올림 경계(x.5)에서 부동소수 오차가 생기지 않는다.

use std::collections::HashMap;

use crate::error::LedgerError;
use crate::types::{MaterialType, Unit};

/// 요율 단위 (1 point = 1000 milli-points)
const RATE_SCALE: f64 = 1000.0;

/// 한 번에 기록할 수 있는 최대 수량
const MAX_QUANTITY: f64 = 10_000_000.0;

/// 버전이 붙은 소재 → 단위 → 요율표
#[derive(Debug, Clone)]
pub struct RateTable {
    pub version: i32,
    rates: HashMap<MaterialType, HashMap<Unit, i64>>,
}

impl RateTable {
    /// 현재 요율표
    ///
    /// | 소재 | gm | unidades |
    /// |---|---|---|
    /// | Plástico | 0.02 | 20 |
    /// | Papel | 0.015 | 15 |
    /// | Vidro | - | 10 |
    /// | Metal | 0.075 | 75 |
    /// | Outros | 0.005 | 5 |
    pub fn v1() -> Self {
        let entries: [(MaterialType, &[(Unit, i64)]); 5] = [
            (MaterialType::Plastico, &[(Unit::Gram, 20), (Unit::Item, 20_000)]),
            (MaterialType::Papel, &[(Unit::Gram, 15), (Unit::Item, 15_000)]),
            (MaterialType::Vidro, &[(Unit::Item, 10_000)]),
            (MaterialType::Metal, &[(Unit::Gram, 75), (Unit::Item, 75_000)]),
            (MaterialType::Outros, &[(Unit::Gram, 5), (Unit::Item, 5_000)]),
        ];

        let rates = entries
            .into_iter()
            .map(|(material, units)| (material, units.iter().copied().collect()))
            .collect();

        Self { version: 1, rates }
    }

    /// milli-points per unit
    pub fn rate(&self, material: MaterialType, unit: Unit) -> Option<i64> {
        self.rates.get(&material)?.get(&unit).copied()
    }

    pub fn supported_units(&self, material: MaterialType) -> Vec<Unit> {
        let mut units: Vec<Unit> = self
            .rates
            .get(&material)
            .map(|u| u.keys().copied().collect())
            .unwrap_or_default();
        units.sort_by_key(|u| u.as_str());
        units
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::v1()
    }
}

/// 포인트 계산기
#[derive(Debug, Clone, Default)]
pub struct PointsEngine {
    rates: RateTable,
}

impl PointsEngine {
    pub fn new(rates: RateTable) -> Self {
        Self { rates }
    }

    pub fn rate_version(&self) -> i32 {
        self.rates.version
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// 수동 입력: `round(quantity * rate)`, 반올림은 half-up
    ///
    /// 수량이 0 이하이거나 유한하지 않으면, 또는 소재가 해당 단위를 지원하지 않으면
    /// `LedgerError::Validation`.
    pub fn compute_manual_points(
        &self,
        material: MaterialType,
        quantity: f64,
        unit: Unit,
    ) -> Result<i64, LedgerError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(LedgerError::Validation(
                "quantity must be a positive number".to_string(),
            ));
        }
        if quantity > MAX_QUANTITY {
            return Err(LedgerError::Validation(format!(
                "quantity must not exceed {}",
                MAX_QUANTITY
            )));
        }

        let rate = self.rates.rate(material, unit).ok_or_else(|| {
            LedgerError::Validation(format!("{} cannot be logged in '{}'", material, unit))
        })?;

        // 양수이므로 f64::round (half away from zero) == half-up
        Ok((quantity * rate as f64 / RATE_SCALE).round() as i64)
    }

    /// AI 사진 검증 결과 → 포인트
    ///
    /// `is_valid == false`면 oracle이 무엇을 보고했든 0.
    pub fn compute_photo_verified_points(material: MaterialType, is_valid: bool) -> i64 {
        if !is_valid {
            return 0;
        }
        match material {
            MaterialType::Plastico => 20,
            MaterialType::Papel => 15,
            MaterialType::Vidro => 10,
            MaterialType::Metal => 75,
            MaterialType::Outros => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_points_by_weight() {
        let engine = PointsEngine::default();

        // 1000g 플라스틱 * 0.02 = 20
        assert_eq!(
            engine.compute_manual_points(MaterialType::Plastico, 1000.0, Unit::Gram).unwrap(),
            20
        );
        // 1000g 금속 * 0.075 = 75 (최고 요율)
        assert_eq!(
            engine.compute_manual_points(MaterialType::Metal, 1000.0, Unit::Gram).unwrap(),
            75
        );
        assert_eq!(
            engine.compute_manual_points(MaterialType::Vidro, 3.0, Unit::Item).unwrap(),
            30
        );
    }

    #[test]
    fn test_manual_points_round_half_up() {
        let engine = PointsEngine::default();

        // 100g 종이 * 0.015 = 1.5 → 2
        assert_eq!(
            engine.compute_manual_points(MaterialType::Papel, 100.0, Unit::Gram).unwrap(),
            2
        );
        // 90g 종이 * 0.015 = 1.35 → 1
        assert_eq!(
            engine.compute_manual_points(MaterialType::Papel, 90.0, Unit::Gram).unwrap(),
            1
        );
        // 10g 기타 * 0.005 = 0.05 → 0
        assert_eq!(
            engine.compute_manual_points(MaterialType::Outros, 10.0, Unit::Gram).unwrap(),
            0
        );
    }

    #[test]
    fn test_manual_points_deterministic_and_non_negative() {
        let engine = PointsEngine::default();
        for material in MaterialType::ALL {
            for unit in engine.rates.supported_units(material) {
                for quantity in [0.5, 1.0, 7.0, 333.3, 1000.0, 25_000.0] {
                    let a = engine.compute_manual_points(material, quantity, unit).unwrap();
                    let b = engine.compute_manual_points(material, quantity, unit).unwrap();
                    assert_eq!(a, b);
                    assert!(a >= 0);
                }
            }
        }
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let engine = PointsEngine::default();
        for quantity in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = engine
                .compute_manual_points(MaterialType::Plastico, quantity, Unit::Gram)
                .unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)));
        }
    }

    #[test]
    fn test_rejects_unsupported_unit() {
        let engine = PointsEngine::default();
        let err = engine
            .compute_manual_points(MaterialType::Vidro, 500.0, Unit::Gram)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_photo_points_table() {
        assert_eq!(PointsEngine::compute_photo_verified_points(MaterialType::Plastico, true), 20);
        assert_eq!(PointsEngine::compute_photo_verified_points(MaterialType::Papel, true), 15);
        assert_eq!(PointsEngine::compute_photo_verified_points(MaterialType::Vidro, true), 10);
        assert_eq!(PointsEngine::compute_photo_verified_points(MaterialType::Metal, true), 75);
        assert_eq!(PointsEngine::compute_photo_verified_points(MaterialType::Outros, true), 5);
    }

    #[test]
    fn test_photo_points_invalid_is_zero() {
        for material in MaterialType::ALL {
            assert_eq!(PointsEngine::compute_photo_verified_points(material, false), 0);
        }
    }

    #[test]
    fn test_rate_table_version() {
        assert_eq!(PointsEngine::default().rate_version(), 1);
        assert_eq!(
            RateTable::v1().supported_units(MaterialType::Vidro),
            vec![Unit::Item]
        );
    }
}
