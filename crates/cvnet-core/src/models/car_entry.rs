//! 차량 입출차 기록 모델.
//!
//! 서버 응답의 페이지 번호/행 수/다음 페이지 여부는 숫자/문자열이 섞여 오므로
//! `CarEntryPage::from_response`에서 정규화한다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient;

/// 입출차 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarDirection {
    /// 입차 (`inout == "0"`)
    Entered,
    /// 출차 (그 외)
    Exited,
}

/// 차량 입출차 기록: (`title`, `date_time`) 쌍이 식별자
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarEntryRecord {
    /// 차량 번호
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    /// 입출차 시각
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_time: String,
    /// 입출차 플래그 원문 ("0" = 입차)
    #[serde(default, deserialize_with = "lenient::string")]
    pub inout: String,
}

impl CarEntryRecord {
    pub fn direction(&self) -> CarDirection {
        if self.inout.trim() == "0" {
            CarDirection::Entered
        } else {
            CarDirection::Exited
        }
    }

    /// 변경 감지용 식별 키 (`{title}_{date_time}`)
    pub fn key(&self) -> String {
        format!("{}_{}", self.title, self.date_time)
    }
}

/// 정규화된 입출차 목록 페이지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarEntryPage {
    pub records: Vec<CarEntryRecord>,
    /// 1부터 시작하는 페이지 번호
    pub page: u32,
    pub rows: u32,
    pub has_next: bool,
}

impl CarEntryPage {
    /// 요청 파라미터만 반영한 빈 페이지 (JSON 파싱 실패 시)
    pub fn empty(page: u32, rows: u32) -> Self {
        Self {
            records: Vec::new(),
            page,
            rows,
            has_next: false,
        }
    }

    /// 서버 응답 정규화
    ///
    /// - `page_no`/`pageNo`: 숫자 또는 문자열, 선행 0 제거 ("007" → 7, "000" → 1).
    ///   빈 문자열/숫자 0인 키는 없는 것으로 보고 다음 후보(별칭 → 요청값)로 넘어간다
    /// - `rows`: 숫자 또는 문자열, 해석 불가 시 요청값
    /// - `exist_next`: 불리언/숫자/문자열 진리값
    pub fn from_response(value: &Value, requested_page: u32, requested_rows: u32) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::empty(requested_page, requested_rows);
        };

        let records = obj
            .get("contents")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<CarEntryRecord>(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let filled = |key: &str| obj.get(key).filter(|v| lenient::is_filled(v));
        let page = filled("page_no")
            .or_else(|| filled("pageNo"))
            .and_then(lenient::scalar_to_string)
            .and_then(|raw| normalize_page(&raw))
            .unwrap_or(requested_page);

        let rows = obj
            .get("rows")
            .and_then(lenient::scalar_to_string)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|rows| *rows > 0)
            .unwrap_or(requested_rows);

        let has_next = obj.get("exist_next").is_some_and(lenient::truthy);

        Self {
            records,
            page,
            rows,
            has_next,
        }
    }
}

/// 선행 0을 제거한 페이지 번호 (모두 0이면 1, 숫자가 아니면 None)
fn normalize_page(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let stripped = raw.trim_start_matches('0');
    if stripped.is_empty() {
        return Some(1);
    }
    stripped.parse().ok()
}
