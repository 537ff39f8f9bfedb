//! 상태 조회 상관기.
//!
//! 주소에 `{"request":"status"}` publish 프레임을 보내고, 정해진 횟수만큼
//! 프레임을 받아 보며 `a[`로 시작하는 메시지를 찾는다. 하트비트나 관계없는
//! 프레임은 건너뛰고, 어떤 실패든 `None`으로 끝난다.

use cvnet_core::error::CoreError;
use cvnet_core::models::control::{Command, StatusReply};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::channel::{ControlChannel, EndpointSource};
use crate::sockjs;
use crate::ws_client::WsMessage;

pub struct StatusCorrelator {
    channel: Arc<ControlChannel>,
    source: Arc<dyn EndpointSource>,
    attempts: u32,
    frame_timeout: Duration,
}

impl StatusCorrelator {
    pub fn new(
        channel: Arc<ControlChannel>,
        source: Arc<dyn EndpointSource>,
        attempts: u32,
        frame_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            source,
            attempts,
            frame_timeout,
        }
    }

    pub async fn status_snapshot(&self, address: &str) -> Option<StatusReply> {
        match self.request(address.trim()).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("상태 조회 실패 ({address}): {e}");
                None
            }
        }
    }

    async fn request(&self, address: &str) -> Result<Option<StatusReply>, CoreError> {
        if address.is_empty() {
            return Err(CoreError::validation("address", "비어 있음"));
        }
        let frame =
            sockjs::publish_frame(address, &Command::status(), &self.source.publish_identity())?;

        let mut guard = self.channel.lock().await;
        guard.ensure_open(self.source.as_ref(), None).await?;
        guard.ensure_registered(address).await?;

        let dropped = guard.drain();
        if dropped > 0 {
            debug!("상태 요청 전 대기 프레임 {dropped}개 폐기");
        }
        guard.send(&frame).await?;

        for attempt in 1..=self.attempts {
            match guard.recv(self.frame_timeout).await? {
                None => debug!("상태 프레임 대기 타임아웃 ({attempt}/{})", self.attempts),
                Some(WsMessage::Text(text)) if text.starts_with("a[") => {
                    match sockjs::decode_array_message(&text) {
                        Some(reply) => return Ok(Some(reply)),
                        None => debug!("해석 불가 메시지 프레임 건너뜀: {text}"),
                    }
                }
                Some(other) => debug!("상태 프레임 아님, 건너뜀: {other:?}"),
            }
        }
        Ok(None)
    }
}
