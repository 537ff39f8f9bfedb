//! 게이트웨이 클라이언트 포트.
//!
//! 구현: `cvnet-network` crate (`CvnetClient`: reqwest + tokio-tungstenite)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::car_entry::CarEntryPage;
use crate::models::control::{Command, PublishAck, StatusReply};
use crate::models::session::SessionDiagnostics;
use crate::models::telemeter::TelemeterReading;
use crate::models::visitor::VisitorRecord;

/// CVNET 게이트웨이 클라이언트
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// 사용자명/비밀번호 로그인
    ///
    /// 성공 시 자격증명을 캐시하고 세션을 갱신 상태로 표시한다.
    /// 실패해도 스스로 재시도하지 않는다.
    async fn login(&self, username: &str, password: &str) -> Result<(), CoreError>;

    /// 부재중 방문자 목록 (1부터 시작하는 페이지)
    ///
    /// 서버가 JSON이 아닌 본문을 주면 빈 목록을 반환한다.
    async fn list_visitors(&self, page: u32, rows: u32) -> Result<Vec<VisitorRecord>, CoreError>;

    /// 차량 입출차 목록 (정규화된 페이지)
    async fn list_car_entries(&self, page: u32, rows: u32) -> Result<CarEntryPage, CoreError>;

    /// 방문자 이미지 바이트: 없거나 깨졌으면 `None`
    async fn fetch_visitor_image(&self, file_name: &str) -> Result<Option<Vec<u8>>, CoreError>;

    /// 원격 검침값 (전기/수도/가스)
    async fn telemeter(&self) -> Result<TelemeterReading, CoreError>;

    /// 장치 명령 전송 (fire-and-forget, 전송 완료까지만 보장)
    async fn publish(&self, address: &str, command: &Command) -> Result<PublishAck, CoreError>;

    /// 논리 주소의 현재 상태 조회: 응답이 없으면 `None`
    async fn status_snapshot(&self, address: &str) -> Option<StatusReply>;

    /// 세션 강제 만료 (다음 읽기 호출에서 재로그인)
    fn invalidate_session(&self);

    /// 세션 진단 정보
    fn session_diagnostics(&self) -> SessionDiagnostics;

    /// 제어 채널 종료 (여러 번 호출해도 안전)
    async fn close(&self);
}
