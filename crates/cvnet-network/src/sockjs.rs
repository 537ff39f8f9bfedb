//! SockJS 프레이밍과 연결 세대 식별자.
//!
//! 송신 프레임은 "envelope JSON 문자열 하나를 담은 JSON 배열"이다.
//! publish envelope의 `body`는 다시 JSON 문자열로 인코딩된다 (이중 인코딩).
//!
//! ```text
//! ["{\"type\":\"publish\",\"address\":\"18\",\"body\":\"{\\\"id\\\":...}\"}"]
//! ```

use cvnet_core::error::CoreError;
use cvnet_core::models::control::{Command, StatusReply};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// 제어 버스 인증 주소
pub const AUTH_BUS_ADDRESS: &str = "vertx.basicauthmanager.login";

/// 제어 버스 envelope
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Envelope<'a> {
    Register {
        address: &'a str,
    },
    Publish {
        address: &'a str,
        body: String,
    },
    Send {
        address: &'a str,
        body: LoginBody<'a>,
    },
}

/// publish `body`: 필드 순서가 곧 전송 순서
#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    id: &'a str,
    remote_addr: &'a str,
    request: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    onoff: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// publish 본문의 발신자 기본값
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishIdentity {
    pub id: String,
    pub remote_addr: String,
}

/// 수신 프레임 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// `o`: 세션 열림
    Open,
    /// `h`: 서버 하트비트
    Heartbeat,
    /// `a[...]`: 메시지 배열
    Array,
    /// `c[...]`: 서버 종료
    Close,
    Other,
}

pub fn classify(text: &str) -> FrameKind {
    let trimmed = text.trim_start();
    if trimmed.starts_with("a[") {
        FrameKind::Array
    } else if trimmed.starts_with("c[") {
        FrameKind::Close
    } else if trimmed.starts_with('o') {
        FrameKind::Open
    } else if trimmed.starts_with('h') {
        FrameKind::Heartbeat
    } else {
        FrameKind::Other
    }
}

/// envelope 하나를 SockJS 송신 프레임으로 감싼다
fn encode_frame(envelope: &Envelope<'_>) -> Result<String, CoreError> {
    let inner = serde_json::to_string(envelope)?;
    Ok(serde_json::to_string(&[inner])?)
}

pub fn register_frame(address: &str) -> Result<String, CoreError> {
    encode_frame(&Envelope::Register { address })
}

pub fn login_frame(username: &str, password: &str) -> Result<String, CoreError> {
    encode_frame(&Envelope::Send {
        address: AUTH_BUS_ADDRESS,
        body: LoginBody { username, password },
    })
}

/// publish 프레임: 명령에 id/remote_addr가 없으면 `identity` 값 사용
pub fn publish_frame(
    address: &str,
    command: &Command,
    identity: &PublishIdentity,
) -> Result<String, CoreError> {
    let body = PublishBody {
        id: command.id.as_deref().unwrap_or(&identity.id),
        remote_addr: command
            .remote_addr
            .as_deref()
            .unwrap_or(&identity.remote_addr),
        request: &command.request,
        number: command.number.as_deref(),
        onoff: command.onoff.as_deref(),
        brightness: command.brightness.as_deref(),
        zone: command.zone.as_deref(),
        temp: command.temp.as_deref(),
    };
    let body = serde_json::to_string(&body)?;
    encode_frame(&Envelope::Publish { address, body })
}

/// `a[...]` 메시지 프레임에서 첫 envelope를 꺼낸다
///
/// 원소가 문자열이면 JSON으로 풀고, `body`가 문자열 JSON이면 제자리에서 푼다.
/// 형식이 맞지 않으면 `None`.
pub fn decode_array_message(text: &str) -> Option<StatusReply> {
    let rest = text.strip_prefix('a')?;
    let items: Vec<Value> = serde_json::from_str(rest).ok()?;
    let first = items.into_iter().next()?;
    let mut envelope = match first {
        Value::String(inner) => serde_json::from_str::<Value>(&inner).ok()?,
        other => other,
    };

    let obj = envelope.as_object_mut()?;
    let decoded = match obj.get("body") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).ok(),
        _ => None,
    };
    if let Some(body) = decoded {
        obj.insert("body".to_string(), body);
    }
    serde_json::from_value(envelope).ok()
}

/// 연결 세대: 재연결할 때마다 새로 생성되는 SockJS 식별자 쌍
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub id: u64,
    pub server_id: String,
    pub session_id: String,
}

impl Generation {
    pub fn new(id: u64) -> Self {
        let random = Uuid::new_v4();
        let bytes = random.as_bytes();
        let server = u16::from_be_bytes([bytes[0], bytes[1]]) % 1000;
        let session: String = random.simple().to_string().chars().take(8).collect();
        Self {
            id,
            server_id: format!("{server:03}"),
            session_id: session,
        }
    }

    /// `{ws_base}/{server_id}/{session_id}/websocket`
    pub fn ws_url(&self, ws_base: &str) -> String {
        format!(
            "{}/{}/{}/websocket",
            ws_base.trim_end_matches('/'),
            self.server_id,
            self.session_id
        )
    }

    /// `{http_base}/{server_id}/{session_id}/xhr_send`
    pub fn xhr_send_url(&self, ws_base: &str) -> String {
        format!(
            "{}/{}/{}/xhr_send",
            http_base(ws_base).trim_end_matches('/'),
            self.server_id,
            self.session_id
        )
    }
}

/// ws/wss URL을 http/https로 (그 외는 그대로)
pub fn http_base(ws_base: &str) -> String {
    if let Some(rest) = ws_base.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = ws_base.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        ws_base.to_string()
    }
}

/// device_info의 http/https 주소를 ws/wss로
pub fn ws_base_from_http(address: &str) -> String {
    if let Some(rest) = address.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = address.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> PublishIdentity {
        PublishIdentity {
            id: "dev-1".into(),
            remote_addr: "127.0.0.1".into(),
        }
    }

    #[test]
    fn publish_frame_is_double_encoded() {
        let cmd = Command::new("control").number("2").onoff("1");
        let frame = publish_frame("18", &cmd, &identity()).unwrap();

        let outer: Vec<String> = serde_json::from_str(&frame).unwrap();
        assert_eq!(outer.len(), 1);
        let envelope: Value = serde_json::from_str(&outer[0]).unwrap();
        assert_eq!(envelope["type"], "publish");
        assert_eq!(envelope["address"], "18");

        let body_text = envelope["body"].as_str().unwrap();
        let body: Value = serde_json::from_str(body_text).unwrap();
        assert_eq!(body["request"], "control");
        assert_eq!(body["number"], "2");
        assert_eq!(body["onoff"], "1");
        assert_eq!(body["id"], "dev-1");
    }

    #[test]
    fn publish_body_field_order_and_compact() {
        let cmd = Command::new("control").temp(23).number(1).id("me");
        let frame = publish_frame("22", &cmd, &identity()).unwrap();
        let outer: Vec<String> = serde_json::from_str(&frame).unwrap();
        let envelope: Value = serde_json::from_str(&outer[0]).unwrap();
        assert_eq!(
            envelope["body"],
            r#"{"id":"me","remote_addr":"127.0.0.1","request":"control","number":"1","temp":"23"}"#
        );
        assert!(!frame.contains(": "));
    }

    #[test]
    fn register_and_login_frames() {
        let frame = register_frame("18").unwrap();
        assert_eq!(frame, r#"["{\"type\":\"register\",\"address\":\"18\"}"]"#);

        let frame = login_frame("사용자", "pw").unwrap();
        let outer: Vec<String> = serde_json::from_str(&frame).unwrap();
        let envelope: Value = serde_json::from_str(&outer[0]).unwrap();
        assert_eq!(
            envelope,
            json!({"type": "send", "address": AUTH_BUS_ADDRESS,
                   "body": {"username": "사용자", "password": "pw"}})
        );
        // 비ASCII 그대로 유지
        assert!(frame.contains("사용자"));
    }

    #[test]
    fn frame_classification() {
        assert_eq!(classify("o"), FrameKind::Open);
        assert_eq!(classify("  o\n"), FrameKind::Open);
        assert_eq!(classify("h"), FrameKind::Heartbeat);
        assert_eq!(classify(r#"a["x"]"#), FrameKind::Array);
        assert_eq!(classify(r#"c[3000,"Go away!"]"#), FrameKind::Close);
        assert_eq!(classify("xyz"), FrameKind::Other);
    }

    #[test]
    fn array_message_decodes_string_body() {
        let inner = json!({
            "type": "rec",
            "address": "22",
            "body": r#"{"contents":[{"number":"1","onoff":"1"}]}"#
        })
        .to_string();
        let frame = format!("a{}", serde_json::to_string(&[inner]).unwrap());

        let reply = decode_array_message(&frame).unwrap();
        assert_eq!(reply.address.as_deref(), Some("22"));
        assert_eq!(reply.contents().len(), 1);
        assert_eq!(reply.body["contents"][0]["onoff"], "1");
    }

    #[test]
    fn array_message_rejects_garbage() {
        assert!(decode_array_message("a[]").is_none());
        assert!(decode_array_message("a[not json").is_none());
        assert!(decode_array_message("h").is_none());
        assert!(decode_array_message(r#"a["not an object"]"#).is_none());
    }

    #[test]
    fn generation_identifiers() {
        let generation = Generation::new(7);
        assert_eq!(generation.server_id.len(), 3);
        assert!(generation.server_id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(generation.session_id.len(), 8);
        assert!(generation
            .session_id
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let ws = generation.ws_url("wss://host:9099/devicecontrol/");
        assert_eq!(
            ws,
            format!(
                "wss://host:9099/devicecontrol/{}/{}/websocket",
                generation.server_id, generation.session_id
            )
        );
        let xhr = generation.xhr_send_url("wss://host:9099/devicecontrol");
        assert_eq!(
            xhr,
            format!(
                "https://host:9099/devicecontrol/{}/{}/xhr_send",
                generation.server_id, generation.session_id
            )
        );
    }

    #[test]
    fn scheme_rewrites() {
        assert_eq!(ws_base_from_http("https://a/b"), "wss://a/b");
        assert_eq!(ws_base_from_http("http://a/b"), "ws://a/b");
        assert_eq!(http_base("ws://a:1/x"), "http://a:1/x");
        assert_eq!(http_base("https://a"), "https://a");
    }
}
