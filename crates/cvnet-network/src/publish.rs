//! 명령 publish 프로토콜.
//!
//! 프레임은 한 번만 만들고 최대 두 번 시도한다. 각 시도는 쿠키 갱신 → 채널 확보 →
//! 주소 등록 → 전송 → 짧은 즉시 응답 대기 순서이며, 같은 세대의
//! `xhr_send` 경로로 동일 페이로드를 한 번 더 보낸다 (실패해도 무시).
//! 성공은 "프레임 전송됨"이지 장치 확인이 아니다.

use cvnet_core::config::TimeoutConfig;
use cvnet_core::error::CoreError;
use cvnet_core::models::control::{Command, PublishAck};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::channel::{ChannelGuard, ControlChannel, EndpointSource};
use crate::sockjs;
use crate::transport::HttpTransport;

/// publish 최대 시도 횟수
const PUBLISH_ATTEMPTS: u32 = 2;

/// 웹소켓 전송까지 끝난 시도 결과
struct Sent {
    generation: u64,
    immediate_reply: Option<String>,
    fallback_url: Option<String>,
}

pub struct Publisher {
    transport: Arc<HttpTransport>,
    channel: Arc<ControlChannel>,
    source: Arc<dyn EndpointSource>,
    timeouts: TimeoutConfig,
}

impl Publisher {
    pub fn new(
        transport: Arc<HttpTransport>,
        channel: Arc<ControlChannel>,
        source: Arc<dyn EndpointSource>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            transport,
            channel,
            source,
            timeouts,
        }
    }

    pub async fn publish(&self, address: &str, command: &Command) -> Result<PublishAck, CoreError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(CoreError::validation("address", "비어 있음"));
        }
        if command.request.trim().is_empty() {
            return Err(CoreError::validation("request", "비어 있음"));
        }

        let frame = sockjs::publish_frame(address, command, &self.source.publish_identity())?;
        debug!("publish 프레임: {frame}");

        let mut stale = None;
        let mut last_err = None;
        for attempt in 1..=PUBLISH_ATTEMPTS {
            self.transport.prime_cookies().await;

            let sent = {
                let mut guard = self.channel.lock().await;
                match self.send_once(&mut guard, address, &frame, stale).await {
                    Ok(sent) => Ok(sent),
                    Err(e) => {
                        stale = guard.generation().map(|g| g.id);
                        guard.disconnect().await;
                        Err(e)
                    }
                }
            };

            match sent {
                Ok(sent) => {
                    let fallback_delivered = match &sent.fallback_url {
                        Some(url) => self.mirror_over_http(url, &frame).await,
                        None => false,
                    };
                    info!("publish 전송 완료: 주소 {address}, 세대 {}", sent.generation);
                    return Ok(PublishAck {
                        address: address.to_string(),
                        generation: sent.generation,
                        immediate_reply: sent.immediate_reply,
                        fallback_delivered,
                    });
                }
                Err(e) if e.is_connection_class() => {
                    warn!("publish 시도 {attempt}/{PUBLISH_ATTEMPTS} 실패: {e}");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(CoreError::Api(format!(
            "publish 실패: {}",
            last_err.map_or_else(|| "알 수 없는 오류".to_string(), |e| e.to_string())
        )))
    }

    /// 채널 확보부터 웹소켓 전송까지 (잠금을 쥔 상태)
    async fn send_once(
        &self,
        guard: &mut ChannelGuard<'_>,
        address: &str,
        frame: &str,
        stale: Option<u64>,
    ) -> Result<Sent, CoreError> {
        let generation = guard.ensure_open(self.source.as_ref(), stale).await?;
        guard.ensure_registered(address).await?;
        guard.send(frame).await?;

        let immediate_reply = match guard.recv(self.timeouts.publish_reply()).await {
            Ok(Some(msg)) => {
                debug!("publish 직후 프레임: {msg:?}");
                msg.as_text().map(str::to_string)
            }
            Ok(None) => {
                debug!("publish 즉시 응답 없음");
                None
            }
            Err(e) => {
                debug!("publish 직후 수신 실패 (무시): {e}");
                None
            }
        };

        Ok(Sent {
            generation,
            immediate_reply,
            fallback_url: guard.fallback_url_for(generation),
        })
    }

    /// xhr_send 폴백: 2xx면 true, 그 외/실패는 false (에러로 올리지 않음)
    async fn mirror_over_http(&self, url: &str, frame: &str) -> bool {
        match self
            .transport
            .post_text(
                url,
                self.transport.headers().xhr_send(),
                frame,
                self.timeouts.fallback(),
            )
            .await
        {
            Ok(reply) => {
                debug!("xhr_send HTTP {}: {}", reply.status, reply.excerpt());
                (200..300).contains(&reply.status)
            }
            Err(e) => {
                debug!("xhr_send 폴백 실패 (무시): {e}");
                false
            }
        }
    }
}
