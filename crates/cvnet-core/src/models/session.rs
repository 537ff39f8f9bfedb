//! 세션 모델.
//!
//! 장치 정보 응답에서 학습한 값과 세션 진단 정보를 표현.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// device_info 응답에서 학습한 장치 프로필
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// 장치 ID (`id`)
    pub device_id: Option<String>,
    /// 원격 주소 (`tcp_remote_addr`)
    pub remote_addr: Option<String>,
    /// SockJS 웹소켓 기본 URL (`websock_address`, ws/wss로 변환됨)
    pub ws_base: Option<String>,
}

impl DeviceProfile {
    /// 새로 학습한 값 중 비어 있지 않은 것만 덮어쓴다
    pub fn merge(&mut self, other: DeviceProfile) {
        if other.device_id.is_some() {
            self.device_id = other.device_id;
        }
        if other.remote_addr.is_some() {
            self.remote_addr = other.remote_addr;
        }
        if other.ws_base.is_some() {
            self.ws_base = other.ws_base;
        }
    }
}

/// 세션 진단 정보 (진단 화면/로그용)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    /// 캐시된 자격증명 보유 여부
    pub has_credentials: bool,
    /// 로그인 사용자명
    pub username: Option<String>,
    /// 마지막 성공 요청 시각
    pub last_successful_at: Option<DateTime<Utc>>,
    /// 세션 만료 여부
    pub is_expired: bool,
    /// 마지막 성공 이후 경과 시간 (시간 단위)
    pub hours_since_success: Option<f64>,
}
