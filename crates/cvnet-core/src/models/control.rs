//! 제어 버스 명령/응답 모델.
//!
//! `Command`는 publish envelope의 `body`로 들어갈 명령 필드 집합이다.
//! 모든 선택 필드는 문자열로 강제 변환되어 전송된다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 장치 명령 필드
///
/// ```rust,ignore
/// let cmd = Command::new("control").number(2).onoff(1);
/// client.publish("18", &cmd).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// 요청 종류 ("control", "control_all", "status" 등)
    pub request: String,
    /// 발신자 ID (없으면 장치 ID → 사용자명 → 클라이언트 ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// 발신 주소 (없으면 장치 원격 주소 → 127.0.0.1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onoff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<String>,
}

impl Command {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    /// 상태 조회 명령 (`{"request":"status"}`)
    pub fn status() -> Self {
        Self::new("status")
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn number(mut self, v: impl ToString) -> Self {
        self.number = Some(v.to_string());
        self
    }

    pub fn onoff(mut self, v: impl ToString) -> Self {
        self.onoff = Some(v.to_string());
        self
    }

    pub fn brightness(mut self, v: impl ToString) -> Self {
        self.brightness = Some(v.to_string());
        self
    }

    pub fn zone(mut self, v: impl ToString) -> Self {
        self.zone = Some(v.to_string());
        self
    }

    pub fn temp(mut self, v: impl ToString) -> Self {
        self.temp = Some(v.to_string());
        self
    }
}

/// publish 결과: "프레임 전송됨"을 의미하며 장치 확인 응답은 아님
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishAck {
    /// 대상 논리 주소
    pub address: String,
    /// 프레임을 실어 보낸 연결 세대
    pub generation: u64,
    /// publish 직후 수신된 프레임 원문 (있으면)
    pub immediate_reply: Option<String>,
    /// xhr_send 폴백 경로가 2xx로 응답했는지 (권고용, 실패해도 에러 아님)
    pub fallback_delivered: bool,
}

/// 상태 조회 응답: SockJS 배열 메시지의 내부 envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    /// envelope 종류 (`type`)
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// 응답 주소
    #[serde(default)]
    pub address: Option<String>,
    /// 완전히 디코딩된 본문 (문자열 JSON이었다면 객체로 풀려 있음)
    #[serde(default)]
    pub body: Value,
}

impl StatusReply {
    /// 본문의 `contents` 배열 (난방 방별 상태 등)
    pub fn contents(&self) -> &[Value] {
        self.body
            .get("contents")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
