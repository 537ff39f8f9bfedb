//! CVNET 핵심 에러 타입.
//!
//! 게이트웨이 클라이언트의 모든 공개 연산은 `CoreError`를 반환한다.
//! 예상 가능한 부재(빈 목록, 이미지 없음, 상태 응답 없음)는 에러가 아니라
//! `Option`/빈 값으로 표현한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 호출자 입력 오류: 재시도하지 않고 즉시 반환
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 인증 거부 또는 로그인 후 검증 실패
    #[error("로그인 에러: {0}")]
    Login(String),

    /// 재시도 예산 소진 후의 HTTP/프로토콜 실패
    #[error("API 에러: {0}")]
    Api(String),

    /// 제어 채널 수립 실패 (타임아웃 포함): 백오프 대상
    #[error("연결 에러: {0}")]
    Connection(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 필드 검증 에러 생성 헬퍼
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// 연결 계열 에러인지 판별 (재연결/백오프 경로로 흘려보낼 대상)
    pub fn is_connection_class(&self) -> bool {
        matches!(self, CoreError::Connection(_) | CoreError::Io(_))
    }
}
