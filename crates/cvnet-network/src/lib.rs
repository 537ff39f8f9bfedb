//! # cvnet-network
//!
//! CVNET 게이트웨이 네트워크 어댑터.
//! 쿠키 세션 기반 REST 호출과 SockJS-over-WebSocket 제어 채널을 담당하며
//! 401 재인증, 재연결 백오프, publish 이중 경로(WebSocket + xhr_send)를 지원한다.
//!
//! ## 구성
//!
//! - [`transport`]: 쿠키 저장소를 공유하는 reqwest 전송기
//! - [`session`]: 자격증명/세션 신선도/재인증
//! - [`http_client`]: 방문자·입출차·이미지·검침·장치 정보 REST 호출
//! - [`sockjs`]: 프레이밍, 연결 세대 식별자
//! - [`ws_client`]: tokio-tungstenite 연결 (수신 태스크 + 하트비트)
//! - [`channel`]: 제어 채널 상태 기계
//! - [`publish`] / [`status`]: 명령 전송, 상태 조회
//! - [`client`]: `GatewayClient` 포트 구현
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use cvnet_network::CvnetClient;
//!
//! let client = CvnetClient::new(config)?;
//! client.login("user", "password").await?;
//! let snapshot = client.status_snapshot("22").await;
//! ```

pub mod backoff;
pub mod channel;
pub mod client;
pub mod endpoints;
pub mod http_client;
pub mod publish;
pub mod session;
pub mod sockjs;
pub mod status;
pub mod transport;
pub mod ws_client;

pub use client::CvnetClient;
