//! 게이트웨이 클라이언트 설정 구조체.
//!
//! 벤더 서버 URL, 각 단계별 타임아웃, 제어 채널 하트비트/백오프,
//! 세션 만료 임계값, 목록 조회 기본 행 수를 정의한다.
//! `ConfigLoader`를 통해 JSON 파일에서 로드 (누락 필드는 기본값).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 최상위 게이트웨이 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// 서버 연결 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 단계별 타임아웃
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// 제어 채널 설정
    #[serde(default)]
    pub channel: ChannelConfig,
    /// 세션 설정
    #[serde(default)]
    pub session: SessionConfig,
    /// 목록 조회 설정
    #[serde(default)]
    pub paging: PagingConfig,
}

// ============================================================
// 서버 설정
// ============================================================

/// 서버 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// REST 기본 URL (예: "https://js-thehue.uasis.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// device_info 응답에 웹소켓 주소가 없을 때 사용할 SockJS 기본 URL
    #[serde(default = "default_ws_base")]
    pub default_ws_base: String,
    /// 요청에 실을 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 장치 ID/사용자명을 모를 때 명령 envelope에 넣을 식별자
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_ws_base: default_ws_base(),
            user_agent: default_user_agent(),
            client_id: default_client_id(),
        }
    }
}

// ============================================================
// 타임아웃 설정
// ============================================================

/// 단계별 타임아웃 (밀리초)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// HTTP 요청 타임아웃
    #[serde(default = "default_http_ms")]
    pub http_ms: u64,
    /// 웹소켓 연결(TCP+TLS+업그레이드) 타임아웃
    #[serde(default = "default_ws_connect_ms")]
    pub ws_connect_ms: u64,
    /// SockJS open 프레임(`o`) 대기 타임아웃
    #[serde(default = "default_handshake_ms")]
    pub handshake_ms: u64,
    /// 로그인 프레임 응답 대기 (만료 시 무시하고 진행)
    #[serde(default = "default_login_reply_ms")]
    pub login_reply_ms: u64,
    /// publish 직후 즉시 응답 대기 (만료 시 무시)
    #[serde(default = "default_publish_reply_ms")]
    pub publish_reply_ms: u64,
    /// 상태 프레임 1회 수신 타임아웃
    #[serde(default = "default_status_frame_ms")]
    pub status_frame_ms: u64,
    /// xhr_send 폴백 요청 타임아웃
    #[serde(default = "default_fallback_ms")]
    pub fallback_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            http_ms: default_http_ms(),
            ws_connect_ms: default_ws_connect_ms(),
            handshake_ms: default_handshake_ms(),
            login_reply_ms: default_login_reply_ms(),
            publish_reply_ms: default_publish_reply_ms(),
            status_frame_ms: default_status_frame_ms(),
            fallback_ms: default_fallback_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn http(&self) -> Duration {
        Duration::from_millis(self.http_ms)
    }

    pub fn ws_connect(&self) -> Duration {
        Duration::from_millis(self.ws_connect_ms)
    }

    pub fn handshake(&self) -> Duration {
        Duration::from_millis(self.handshake_ms)
    }

    pub fn login_reply(&self) -> Duration {
        Duration::from_millis(self.login_reply_ms)
    }

    pub fn publish_reply(&self) -> Duration {
        Duration::from_millis(self.publish_reply_ms)
    }

    pub fn status_frame(&self) -> Duration {
        Duration::from_millis(self.status_frame_ms)
    }

    pub fn fallback(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }
}

// ============================================================
// 제어 채널 설정
// ============================================================

/// 제어 채널 설정: 하트비트, 재연결 백오프, 상태 조회 시도 횟수
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// 웹소켓 ping 주기 (초, 0이면 비활성)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// 백오프 기본 지연 (밀리초)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// 백오프 최대 지연 (밀리초)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// 상태 조회 시 프레임 수신 시도 횟수
    #[serde(default = "default_status_attempts")]
    pub status_attempts: u32,
    /// 수신 프레임 큐 용량
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            status_attempts: default_status_attempts(),
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

impl ChannelConfig {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

// ============================================================
// 세션/목록 설정
// ============================================================

/// 세션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 마지막 성공 요청 이후 이 시간이 지나면 세션 만료로 간주
    #[serde(default = "default_session_timeout_hours")]
    pub timeout_hours: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_hours: default_session_timeout_hours(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.timeout_hours))
    }
}

/// 목록 조회 설정: 행 수가 0 이하로 들어오면 이 값으로 보정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_rows")]
    pub visitor_rows: u32,
    #[serde(default = "default_rows")]
    pub car_rows: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            visitor_rows: default_rows(),
            car_rows: default_rows(),
        }
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_base_url() -> String {
    "https://js-thehue.uasis.com".to_string()
}
fn default_ws_base() -> String {
    "wss://js-thehue.uasis.com:9099/devicecontrol".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15".to_string()
}
fn default_client_id() -> String {
    "homeassistant".to_string()
}
fn default_http_ms() -> u64 {
    10_000
}
fn default_ws_connect_ms() -> u64 {
    10_000
}
fn default_handshake_ms() -> u64 {
    5_000
}
fn default_login_reply_ms() -> u64 {
    2_000
}
fn default_publish_reply_ms() -> u64 {
    1_000
}
fn default_status_frame_ms() -> u64 {
    2_000
}
fn default_fallback_ms() -> u64 {
    10_000
}
fn default_heartbeat_secs() -> u64 {
    20
}
fn default_backoff_base_ms() -> u64 {
    1_000
}
fn default_backoff_max_ms() -> u64 {
    60_000
}
fn default_status_attempts() -> u32 {
    6
}
fn default_inbox_capacity() -> usize {
    64
}
fn default_session_timeout_hours() -> u32 {
    24
}
fn default_rows() -> u32 {
    5
}
