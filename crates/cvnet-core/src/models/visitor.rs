//! 방문자 기록 모델.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

/// 부재중 방문자 기록: `file_name`이 식별 키
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorRecord {
    /// 방문자 이미지 파일명 (식별 키, 이미지 조회에 사용)
    #[serde(deserialize_with = "lenient::string")]
    pub file_name: String,
    /// 방문 시각 (서버 원문)
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_time: String,
    /// 표시 제목
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    /// 그 외 서버 필드 (원문 보존)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VisitorRecord {
    /// 목록 응답(`{"contents": [...]}`)에서 레코드 추출
    ///
    /// `file_name`이 없는 항목은 식별 불가이므로 건너뛴다.
    pub fn from_list_response(value: &Value) -> Vec<VisitorRecord> {
        value
            .get("contents")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<VisitorRecord>(item.clone()).ok())
                    .filter(|v| !v.file_name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
