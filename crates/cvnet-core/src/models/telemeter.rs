//! 원격 검침 모델 (전기/수도/가스).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

/// 원격 검침값: 누락/해석 불가 필드는 None
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemeterReading {
    /// 전기 (kWh)
    pub electric: Option<f64>,
    /// 수도 (m³)
    pub water: Option<f64>,
    /// 가스 (m³)
    pub gas: Option<f64>,
}

impl TelemeterReading {
    pub fn from_response(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(lenient::number);
        Self {
            electric: field("electric"),
            water: field("water"),
            gas: field("gas"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.electric.is_none() && self.water.is_none() && self.gas.is_none()
    }
}
