//! WebSocket 연결.
//!
//! `tokio-tungstenite` 기반. 수신 태스크가 프레임을 bounded 큐로 넘기고,
//! 송신은 mutex로 보호된 sink 하나를 공유한다. 하트비트 태스크가
//! 주기적으로 ping을 보내며, 어느 쪽이든 스트림이 끊기면 `closed` 표시.

use cvnet_core::error::CoreError;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket으로 수신한 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// 텍스트 프레임
    Text(String),
    /// 바이너리 프레임
    Binary(Vec<u8>),
    /// 연결 종료
    Close,
}

impl WsMessage {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// 연결 옵션
#[derive(Debug, Clone)]
pub struct WsConnectOptions {
    pub url: String,
    /// 업그레이드 요청에 추가할 헤더 (Origin, Cookie 등)
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
    /// ping 주기 (None이면 하트비트 없음)
    pub heartbeat: Option<Duration>,
    pub inbox_capacity: usize,
}

/// WebSocket 송신기
#[derive(Clone)]
pub struct WsSender {
    write: Arc<tokio::sync::Mutex<SplitSink<WsStream, Message>>>,
    closed: Arc<AtomicBool>,
}

impl WsSender {
    /// 텍스트 메시지 전송: 실패하면 연결을 닫힌 것으로 표시
    pub async fn send_text(&self, text: &str) -> Result<(), CoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoreError::Connection("WebSocket이 이미 닫힘".to_string()));
        }
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| {
                self.closed.store(true, Ordering::SeqCst);
                CoreError::Connection(format!("WebSocket 전송 실패: {e}"))
            })
    }

    async fn ping(&self) -> Result<(), CoreError> {
        let mut write = self.write.lock().await;
        write
            .send(Message::Ping(Default::default()))
            .await
            .map_err(|e| CoreError::Connection(format!("WebSocket ping 실패: {e}")))
    }

    async fn close(&self) {
        let mut write = self.write.lock().await;
        if let Err(e) = write.send(Message::Close(None)).await {
            debug!("WebSocket 종료 프레임 전송 실패 (무시): {e}");
        }
    }
}

/// 열린 WebSocket 연결 하나
pub struct WsConnection {
    sender: WsSender,
    inbox: mpsc::Receiver<WsMessage>,
    reader: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

impl WsConnection {
    /// 연결 수립 (TCP + TLS + 업그레이드를 `connect_timeout` 안에)
    pub async fn connect(options: WsConnectOptions) -> Result<Self, CoreError> {
        let mut request = options
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| CoreError::Connection(format!("WebSocket URL 오류: {e}")))?;
        for (name, value) in &options.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers_mut().insert(name, value);
                }
                _ => warn!("WebSocket 헤더 무시: {name}"),
            }
        }

        info!("WebSocket 연결: {}", options.url);
        let (ws_stream, _) = tokio::time::timeout(
            options.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| {
            CoreError::Connection(format!(
                "WebSocket 연결 타임아웃 ({}ms)",
                options.connect_timeout.as_millis()
            ))
        })?
        .map_err(|e| CoreError::Connection(format!("WebSocket 연결 실패: {e}")))?;

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::channel(options.inbox_capacity.max(1));
        let closed = Arc::new(AtomicBool::new(false));

        let sender = WsSender {
            write: Arc::new(tokio::sync::Mutex::new(write)),
            closed: closed.clone(),
        };

        let reader = tokio::spawn(Self::read_loop(read, tx, closed.clone()));
        let heartbeat = options
            .heartbeat
            .map(|every| tokio::spawn(Self::heartbeat_loop(sender.clone(), every)));

        Ok(Self {
            sender,
            inbox: rx,
            reader,
            heartbeat,
            closed,
        })
    }

    /// 수신 루프
    async fn read_loop(
        mut read: SplitStream<WsStream>,
        tx: mpsc::Sender<WsMessage>,
        closed: Arc<AtomicBool>,
    ) {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if tx.send(WsMessage::Text(text.to_string())).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(data)) => {
                    if tx.send(WsMessage::Binary(data.to_vec())).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    let _ = tx.send(WsMessage::Close).await;
                    break;
                }
                Ok(_) => {} // Ping/Pong은 자동 처리
                Err(e) => {
                    warn!("WebSocket 수신 에러: {e}");
                    break;
                }
            }
        }
        closed.store(true, Ordering::SeqCst);
        debug!("WebSocket 수신 루프 종료");
    }

    /// 하트비트 루프: 첫 틱은 건너뛴다
    async fn heartbeat_loop(sender: WsSender, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if sender.closed.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = sender.ping().await {
                warn!("{e}");
                sender.closed.store(true, Ordering::SeqCst);
                break;
            }
        }
    }

    pub async fn send_text(&self, text: &str) -> Result<(), CoreError> {
        self.sender.send_text(text).await
    }

    /// `wait` 안에 다음 프레임 수신
    ///
    /// 타임아웃은 `Ok(None)`, 서버 종료나 큐 종료는 `Connection` 에러.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<WsMessage>, CoreError> {
        match tokio::time::timeout(wait, self.inbox.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(WsMessage::Close)) => {
                self.closed.store(true, Ordering::SeqCst);
                Err(CoreError::Connection("서버가 WebSocket을 닫음".to_string()))
            }
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => {
                self.closed.store(true, Ordering::SeqCst);
                Err(CoreError::Connection("WebSocket 수신 종료".to_string()))
            }
        }
    }

    /// 이미 큐에 쌓인 프레임 버리기: 버린 개수 반환
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(msg) = self.inbox.try_recv() {
            if msg == WsMessage::Close {
                self.closed.store(true, Ordering::SeqCst);
            }
            dropped += 1;
        }
        dropped
    }

    /// 핸들이 닫히지 않았고 수신 태스크가 살아 있는지
    pub fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.reader.is_finished()
    }

    /// 연결 종료 (종료 프레임은 best effort)
    pub async fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.sender.close().await;
        }
        self.abort_tasks();
        debug!("WebSocket 연결 종료");
    }

    fn abort_tasks(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        self.reader.abort();
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
