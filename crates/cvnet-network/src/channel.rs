//! SockJS 제어 채널 상태 기계.
//!
//! ```text
//! Closed ──connect──▶ Handshaking ──"o"──▶ OpenUnauthenticated ──login──▶ OpenAuthenticated
//!    ▲                                                                         │
//!    └──────────────────────── I/O 실패 / close() ◀────────────────────────────┘
//! ```
//!
//! 클라이언트당 채널은 하나이며 상태 전체가 `tokio::sync::Mutex` 하나 뒤에 있다.
//! publish/상태 조회는 잠금을 쥔 `ChannelGuard`로 연결 수립부터 수신까지 진행하므로
//! 재연결이 겹치거나 식별자가 중간에 바뀌지 않는다.

use async_trait::async_trait;
use cvnet_core::config::{ChannelConfig, TimeoutConfig};
use cvnet_core::error::CoreError;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::sockjs::{self, FrameKind, Generation, PublishIdentity};
use crate::ws_client::{WsConnectOptions, WsConnection, WsMessage};

/// 연결 직전에 확정하는 접속 정보
#[derive(Debug, Clone)]
pub struct ChannelEndpoint {
    pub ws_base: String,
    pub username: String,
    pub password: String,
    /// 업그레이드 요청 헤더 (쿠키 포함)
    pub headers: Vec<(String, String)>,
}

/// 채널이 접속 정보와 발신자 신원을 얻어 오는 곳
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// (재)연결 직전 호출: 장치 정보 갱신 등 부수 효과 허용
    async fn resolve(&self) -> ChannelEndpoint;

    fn publish_identity(&self) -> PublishIdentity;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Closed,
    Handshaking,
    OpenUnauthenticated,
    OpenAuthenticated,
}

struct ChannelState {
    phase: ChannelPhase,
    conn: Option<WsConnection>,
    generation: Option<Generation>,
    ws_base: Option<String>,
    registered: HashSet<String>,
    next_generation_id: u64,
}

pub struct ControlChannel {
    state: Mutex<ChannelState>,
    backoff: Backoff,
    timeouts: TimeoutConfig,
    heartbeat: Option<Duration>,
    inbox_capacity: usize,
}

impl ControlChannel {
    pub fn new(timeouts: TimeoutConfig, channel: &ChannelConfig) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                phase: ChannelPhase::Closed,
                conn: None,
                generation: None,
                ws_base: None,
                registered: HashSet::new(),
                next_generation_id: 1,
            }),
            backoff: Backoff::new(channel.backoff_base(), channel.backoff_max()),
            timeouts,
            heartbeat: channel.heartbeat_interval(),
            inbox_capacity: channel.inbox_capacity,
        }
    }

    /// 채널 독점 사용: 반환된 guard가 살아 있는 동안 다른 호출자는 대기
    pub async fn lock(&self) -> ChannelGuard<'_> {
        ChannelGuard {
            state: self.state.lock().await,
            channel: self,
        }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    pub async fn phase(&self) -> ChannelPhase {
        self.state.lock().await.phase
    }

    pub async fn is_healthy(&self) -> bool {
        self.state
            .lock()
            .await
            .conn
            .as_ref()
            .is_some_and(WsConnection::is_healthy)
    }

    /// 채널 종료 (여러 번 호출해도 안전)
    pub async fn close(&self) {
        self.lock().await.disconnect().await;
    }
}

/// 잠금을 쥔 채널 핸들
pub struct ChannelGuard<'a> {
    state: MutexGuard<'a, ChannelState>,
    channel: &'a ControlChannel,
}

impl ChannelGuard<'_> {
    /// 건강한 연결이 있으면 그대로, 아니면 새 세대로 연결: 세대 ID 반환
    ///
    /// `stale`이 현재 세대와 같으면 건강해 보여도 새로 연결한다.
    pub async fn ensure_open(
        &mut self,
        source: &dyn EndpointSource,
        stale: Option<u64>,
    ) -> Result<u64, CoreError> {
        if let (Some(conn), Some(generation)) = (&self.state.conn, &self.state.generation) {
            if conn.is_healthy() && stale != Some(generation.id) {
                return Ok(generation.id);
            }
        }

        self.disconnect().await;
        let channel = self.channel;
        let backoff = &channel.backoff;
        backoff.wait().await;

        let endpoint = source.resolve().await;
        match self.handshake(&endpoint).await {
            Ok(id) => {
                backoff.reset();
                info!("제어 채널 연결 (세대 {id})");
                Ok(id)
            }
            Err(e) => {
                let attempt = backoff.record_failure();
                warn!("제어 채널 연결 실패 (연속 {attempt}회): {e}");
                self.disconnect().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, endpoint: &ChannelEndpoint) -> Result<u64, CoreError> {
        let channel = self.channel;
        let timeouts = &channel.timeouts;
        let id = self.state.next_generation_id;
        self.state.next_generation_id += 1;

        let generation = Generation::new(id);
        let url = generation.ws_url(&endpoint.ws_base);
        self.state.registered.clear();
        self.state.generation = Some(generation);
        self.state.ws_base = Some(endpoint.ws_base.clone());
        self.state.phase = ChannelPhase::Handshaking;

        let mut conn = WsConnection::connect(WsConnectOptions {
            url,
            headers: endpoint.headers.clone(),
            connect_timeout: timeouts.ws_connect(),
            heartbeat: channel.heartbeat,
            inbox_capacity: channel.inbox_capacity,
        })
        .await?;

        match conn.recv_timeout(timeouts.handshake()).await? {
            Some(WsMessage::Text(text)) if sockjs::classify(&text) == FrameKind::Open => {
                debug!("SockJS open 프레임 수신");
            }
            Some(other) => {
                conn.close().await;
                return Err(CoreError::Connection(format!(
                    "SockJS open 실패: {other:?}"
                )));
            }
            None => {
                conn.close().await;
                return Err(CoreError::Connection(
                    "SockJS open 프레임 타임아웃".to_string(),
                ));
            }
        }
        self.state.phase = ChannelPhase::OpenUnauthenticated;

        conn.send_text(&sockjs::login_frame(&endpoint.username, &endpoint.password)?)
            .await?;
        match conn.recv_timeout(timeouts.login_reply()).await? {
            Some(reply) => debug!("채널 로그인 응답: {reply:?}"),
            None => debug!("채널 로그인 응답 없음 (무시)"),
        }

        self.state.conn = Some(conn);
        self.state.phase = ChannelPhase::OpenAuthenticated;
        Ok(id)
    }

    /// 현재 세대에 주소 등록 (세대당 한 번)
    pub async fn ensure_registered(&mut self, address: &str) -> Result<(), CoreError> {
        if self.state.registered.contains(address) {
            return Ok(());
        }
        let frame = sockjs::register_frame(address)?;
        self.send(&frame).await?;
        self.state.registered.insert(address.to_string());
        debug!("주소 등록: {address}");
        Ok(())
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.state.registered.contains(address)
    }

    pub async fn send(&mut self, text: &str) -> Result<(), CoreError> {
        let conn = self.conn()?;
        conn.send_text(text).await
    }

    /// 다음 프레임: 타임아웃이면 `Ok(None)`
    pub async fn recv(&mut self, wait: Duration) -> Result<Option<WsMessage>, CoreError> {
        let conn = self.conn_mut()?;
        conn.recv_timeout(wait).await
    }

    pub fn drain(&mut self) -> usize {
        self.state.conn.as_mut().map_or(0, WsConnection::drain)
    }

    /// 연결 해제: 세대 식별자와 등록 집합도 함께 폐기
    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.state.conn.take() {
            conn.close().await;
        }
        self.state.generation = None;
        self.state.registered.clear();
        self.state.phase = ChannelPhase::Closed;
    }

    pub fn generation(&self) -> Option<&Generation> {
        self.state.generation.as_ref()
    }

    pub fn phase(&self) -> ChannelPhase {
        self.state.phase
    }

    /// `generation_id` 세대가 여전히 살아 있을 때만 그 세대의 xhr_send URL
    pub fn fallback_url_for(&self, generation_id: u64) -> Option<String> {
        let generation = self.state.generation.as_ref()?;
        if generation.id != generation_id {
            return None;
        }
        let ws_base = self.state.ws_base.as_deref()?;
        Some(generation.xhr_send_url(ws_base))
    }

    fn conn(&self) -> Result<&WsConnection, CoreError> {
        self.state
            .conn
            .as_ref()
            .ok_or_else(|| CoreError::Connection("제어 채널이 열려 있지 않음".to_string()))
    }

    fn conn_mut(&mut self) -> Result<&mut WsConnection, CoreError> {
        self.state
            .conn
            .as_mut()
            .ok_or_else(|| CoreError::Connection("제어 채널이 열려 있지 않음".to_string()))
    }
}
