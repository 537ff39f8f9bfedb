//! 문자열/숫자 혼용 필드용 관대한 역직렬화 헬퍼.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// JSON 스칼라를 문자열 형태로 변환 (null/배열/객체는 None)
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 값이 채워져 있는지 (빈 문자열, 0, false, null은 비어 있음으로 간주)
pub(crate) fn is_filled(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// 문자열/숫자/불리언 → String, 그 외는 빈 문자열
pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value).unwrap_or_default())
}

/// 불리언/숫자/문자열 진리값 해석
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !matches!(s.as_str(), "" | "0" | "false" | "n" | "no")
        }
        _ => false,
    }
}

/// 문자열/숫자 → f64
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("Y")));
        assert!(!truthy(&json!("false")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(null)));
    }

    #[test]
    fn filled_values() {
        assert!(is_filled(&json!("3")));
        assert!(is_filled(&json!("0")));
        assert!(is_filled(&json!(7)));
        assert!(!is_filled(&json!("")));
        assert!(!is_filled(&json!("  ")));
        assert!(!is_filled(&json!(0)));
        assert!(!is_filled(&json!(null)));
    }

    #[test]
    fn numbers_from_strings() {
        assert_eq!(number(&json!("150.5")), Some(150.5));
        assert_eq!(number(&json!(3)), Some(3.0));
        assert_eq!(number(&json!("n/a")), None);
    }
}
