//! CVNET 게이트웨이 클라이언트 파사드.
//!
//! 세션 관리자, REST 리소스 클라이언트, 제어 채널, publish/상태 조회를 묶어
//! `GatewayClient` 포트를 구현한다. 모든 가변 상태는 이 인스턴스가 소유한다.

use async_trait::async_trait;
use cvnet_core::config::GatewayConfig;
use cvnet_core::error::CoreError;
use cvnet_core::models::car_entry::CarEntryPage;
use cvnet_core::models::control::{Command, PublishAck, StatusReply};
use cvnet_core::models::session::SessionDiagnostics;
use cvnet_core::models::telemeter::TelemeterReading;
use cvnet_core::models::visitor::VisitorRecord;
use cvnet_core::ports::gateway::GatewayClient;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEndpoint, ChannelPhase, ControlChannel, EndpointSource};
use crate::endpoints::DEVICE_INFO_TYPE;
use crate::http_client::ResourceClient;
use crate::publish::Publisher;
use crate::session::SessionManager;
use crate::sockjs::PublishIdentity;
use crate::status::StatusCorrelator;
use crate::transport::HttpTransport;

/// 채널 (재)연결 시 장치 정보를 갱신하고 접속 정보를 만든다
struct GatewayEndpoints {
    transport: Arc<HttpTransport>,
    session: Arc<SessionManager>,
    resources: Arc<ResourceClient>,
    default_ws_base: String,
    client_id: String,
}

#[async_trait]
impl EndpointSource for GatewayEndpoints {
    async fn resolve(&self) -> ChannelEndpoint {
        if let Err(e) = self.resources.device_info(DEVICE_INFO_TYPE).await {
            warn!("채널 연결 전 장치 정보 갱신 실패 (무시): {e}");
        }

        let ws_base = self
            .session
            .device()
            .ws_base
            .unwrap_or_else(|| self.default_ws_base.clone());
        let identity = self.session.channel_identity(&self.client_id);

        let mut headers = self.transport.headers().websocket();
        if let Some(cookie) = self.transport.cookie_header(&ws_base) {
            headers.push(("Cookie".to_string(), cookie));
        }

        ChannelEndpoint {
            ws_base,
            username: identity.id,
            password: identity.password,
            headers,
        }
    }

    fn publish_identity(&self) -> PublishIdentity {
        let identity = self.session.channel_identity(&self.client_id);
        PublishIdentity {
            id: identity.id,
            remote_addr: identity.remote_addr,
        }
    }
}

/// CVNET 게이트웨이 클라이언트
///
/// ```rust,ignore
/// let client = CvnetClient::new(GatewayConfig::default())?;
/// client.login("user", "password").await?;
/// let visitors = client.list_visitors(1, 5).await?;
/// client.publish("18", &Command::new("control").number(2).onoff(1)).await?;
/// client.close().await;
/// ```
pub struct CvnetClient {
    transport: Arc<HttpTransport>,
    session: Arc<SessionManager>,
    resources: Arc<ResourceClient>,
    channel: Arc<ControlChannel>,
    publisher: Publisher,
    correlator: StatusCorrelator,
    owns_transport: bool,
}

impl CvnetClient {
    /// 자체 HTTP 전송기를 만드는 클라이언트 (close 시 함께 종료)
    pub fn new(config: GatewayConfig) -> Result<Self, CoreError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::build(config, transport, true))
    }

    /// 외부에서 받은 전송기를 공유하는 클라이언트 (close 시 전송기는 그대로)
    pub fn with_transport(config: GatewayConfig, transport: Arc<HttpTransport>) -> Self {
        Self::build(config, transport, false)
    }

    fn build(config: GatewayConfig, transport: Arc<HttpTransport>, owns_transport: bool) -> Self {
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            config.session.timeout(),
        ));
        let resources = Arc::new(ResourceClient::new(
            transport.clone(),
            session.clone(),
            config.paging.clone(),
        ));
        let channel = Arc::new(ControlChannel::new(
            config.timeouts.clone(),
            &config.channel,
        ));
        let endpoints: Arc<dyn EndpointSource> = Arc::new(GatewayEndpoints {
            transport: transport.clone(),
            session: session.clone(),
            resources: resources.clone(),
            default_ws_base: config.server.default_ws_base.clone(),
            client_id: config.server.client_id.clone(),
        });

        let publisher = Publisher::new(
            transport.clone(),
            channel.clone(),
            endpoints.clone(),
            config.timeouts.clone(),
        );
        let correlator = StatusCorrelator::new(
            channel.clone(),
            endpoints,
            config.channel.status_attempts,
            config.timeouts.status_frame(),
        );

        Self {
            transport,
            session,
            resources,
            channel,
            publisher,
            correlator,
            owns_transport,
        }
    }

    /// 로그인 후 장치 정보 조회 (장치 정보 실패는 무시)
    pub async fn login(&self, username: &str, password: &str) -> Result<(), CoreError> {
        self.session.login(username, password).await?;
        if let Err(e) = self.resources.device_info(DEVICE_INFO_TYPE).await {
            debug!("로그인 후 장치 정보 조회 실패 (무시): {e}");
        }
        Ok(())
    }

    pub async fn device_info(&self) -> Result<Value, CoreError> {
        self.resources.device_info(DEVICE_INFO_TYPE).await
    }

    pub async fn list_visitors(&self, page: u32, rows: u32) -> Result<Vec<VisitorRecord>, CoreError> {
        self.resources.list_visitors(page, rows).await
    }

    pub async fn list_car_entries(&self, page: u32, rows: u32) -> Result<CarEntryPage, CoreError> {
        self.resources.list_car_entries(page, rows).await
    }

    pub async fn fetch_visitor_image(&self, file_name: &str) -> Result<Option<Vec<u8>>, CoreError> {
        self.resources.fetch_visitor_image(file_name).await
    }

    pub async fn telemeter(&self) -> Result<TelemeterReading, CoreError> {
        self.resources.telemeter().await
    }

    pub async fn publish(&self, address: &str, command: &Command) -> Result<PublishAck, CoreError> {
        self.publisher.publish(address, command).await
    }

    pub async fn status_snapshot(&self, address: &str) -> Option<StatusReply> {
        self.correlator.status_snapshot(address).await
    }

    pub fn invalidate_session(&self) {
        self.session.invalidate_session();
    }

    pub fn session_diagnostics(&self) -> SessionDiagnostics {
        self.session.diagnostics()
    }

    pub async fn channel_phase(&self) -> ChannelPhase {
        self.channel.phase().await
    }

    pub async fn channel_healthy(&self) -> bool {
        self.channel.is_healthy().await
    }

    /// 연속 채널 연결 실패 횟수
    pub fn reconnect_attempts(&self) -> u32 {
        self.channel.backoff().attempt()
    }

    /// 채널 종료, 소유한 전송기도 종료 (여러 번 호출해도 안전)
    pub async fn close(&self) {
        self.channel.close().await;
        if self.owns_transport {
            self.transport.shutdown();
        }
        info!("게이트웨이 클라이언트 종료");
    }
}

#[async_trait]
impl GatewayClient for CvnetClient {
    async fn login(&self, username: &str, password: &str) -> Result<(), CoreError> {
        CvnetClient::login(self, username, password).await
    }

    async fn list_visitors(&self, page: u32, rows: u32) -> Result<Vec<VisitorRecord>, CoreError> {
        CvnetClient::list_visitors(self, page, rows).await
    }

    async fn list_car_entries(&self, page: u32, rows: u32) -> Result<CarEntryPage, CoreError> {
        CvnetClient::list_car_entries(self, page, rows).await
    }

    async fn fetch_visitor_image(&self, file_name: &str) -> Result<Option<Vec<u8>>, CoreError> {
        CvnetClient::fetch_visitor_image(self, file_name).await
    }

    async fn telemeter(&self) -> Result<TelemeterReading, CoreError> {
        CvnetClient::telemeter(self).await
    }

    async fn publish(&self, address: &str, command: &Command) -> Result<PublishAck, CoreError> {
        CvnetClient::publish(self, address, command).await
    }

    async fn status_snapshot(&self, address: &str) -> Option<StatusReply> {
        CvnetClient::status_snapshot(self, address).await
    }

    fn invalidate_session(&self) {
        CvnetClient::invalidate_session(self);
    }

    fn session_diagnostics(&self) -> SessionDiagnostics {
        CvnetClient::session_diagnostics(self)
    }

    async fn close(&self) {
        CvnetClient::close(self).await;
    }
}
