//! 벤더 REST 경로와 브라우저 흉내 헤더 세트.
//!
//! 백엔드는 브라우저 세션을 전제로 하므로 Origin/Referer/User-Agent와
//! AJAX 표시 헤더가 없으면 요청을 거부한다.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

pub const LOGIN_PATH: &str = "/cvnet/web/login.do";
pub const DEVICE_INFO_PATH: &str = "/cvnet/web/device_info.do";
pub const TELEMETER_VIEW_PATH: &str = "/cvnet/web/telemetering.view";
pub const TELEMETER_PATH: &str = "/cvnet/web/telemetering.do";
pub const WEB_ROOT_PATH: &str = "/cvnet/web/";

pub const VISITOR_LIST_PATH: &str = "/cvnet/web/visitor_list.do";
pub const VISITOR_CONTENT_PATH: &str = "/cvnet/web/visitor_content.do";
pub const VISITOR_REFERER: &str = "/cvnet/web/absence_visitor.view";

pub const CAR_LIST_PATH: &str = "/cvnet/web/entrancecar_list.do";
pub const CAR_REFERER: &str = "/cvnet/web/enter_car.view";

/// 로그인/웹소켓 연결 직후 조회하는 장치 정보 종류
pub const DEVICE_INFO_TYPE: &str = "0x12";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
const JSON_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

/// 헤더 세트 빌더: 서버 기본 URL과 User-Agent를 고정해 둔다
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    base_url: String,
    user_agent: String,
}

impl HeaderProfile {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    /// 일반 페이지 요청 헤더
    pub fn common(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "accept", JSON_ACCEPT);
        insert(&mut headers, "accept-language", "en-GB,en;q=0.9");
        insert(&mut headers, "cache-control", "no-cache");
        insert(&mut headers, "pragma", "no-cache");
        insert(&mut headers, "origin", &self.base_url);
        insert(&mut headers, "referer", &format!("{}/", self.base_url));
        insert(&mut headers, "user-agent", &self.user_agent);
        headers
    }

    /// XHR 요청 헤더 (로그인, device_info)
    pub fn ajax(&self) -> HeaderMap {
        let mut headers = self.common();
        insert(&mut headers, "ajax", "true");
        insert(&mut headers, "x-requested-with", "XMLHttpRequest");
        headers
    }

    /// 목록/이미지 POST 헤더: 폼 인코딩 + 참조 페이지
    pub fn form_with_referer(&self, referer_path: &str) -> HeaderMap {
        let mut headers = self.ajax();
        insert(&mut headers, "content-type", FORM_CONTENT_TYPE);
        insert(
            &mut headers,
            "referer",
            &format!("{}{}", self.base_url, referer_path),
        );
        headers
    }

    /// 세션 친화성용 HTML 프라이밍 요청 헤더
    pub fn html(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "accept", "text/html,application/xhtml+xml");
        insert(&mut headers, "user-agent", &self.user_agent);
        headers
    }

    /// xhr_send 폴백 헤더
    pub fn xhr_send(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "accept", "*/*");
        insert(&mut headers, "content-type", "text/plain;charset=UTF-8");
        insert(&mut headers, "origin", &self.base_url);
        insert(&mut headers, "referer", &format!("{}/", self.base_url));
        insert(&mut headers, "user-agent", &self.user_agent);
        headers
    }

    /// 웹소켓 업그레이드 요청 헤더 (쿠키는 호출자가 추가)
    pub fn websocket(&self) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), "*/*".to_string()),
            ("Accept-Language".to_string(), "en-GB,en;q=0.9".to_string()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("Origin".to_string(), self.base_url.clone()),
            ("Referer".to_string(), format!("{}/", self.base_url)),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ]
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(e) => warn!("헤더 값 무시 ({name}): {e}"),
    }
}
