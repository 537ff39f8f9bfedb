//! 쿠키 세션 HTTP 전송 계층.
//!
//! 모든 REST 호출과 xhr_send 폴백이 하나의 쿠키 저장소를 공유한다.
//! 로그인 POST만 리다이렉트를 따라가지 않는 별도 클라이언트로 보내고,
//! 나머지 요청은 리다이렉트를 따라간다. 웹소켓 업그레이드 요청도 같은 저장소의 쿠키를 싣는다.

use cvnet_core::config::GatewayConfig;
use cvnet_core::error::CoreError;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::endpoints::{HeaderProfile, TELEMETER_VIEW_PATH, WEB_ROOT_PATH};

/// 에러 메시지에 싣는 응답 본문 최대 길이 (문자)
const EXCERPT_CHARS: usize = 160;

/// 상태 코드 + 본문 텍스트
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// 에러 메시지용 본문 앞부분
    pub fn excerpt(&self) -> String {
        self.body.chars().take(EXCERPT_CHARS).collect()
    }

    /// JSON 본문 (파싱 실패 시 None)
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// 쿠키 세션을 공유하는 HTTP 전송기
pub struct HttpTransport {
    client: reqwest::Client,
    /// 리다이렉트 비활성 (login.do 전용)
    unfollowed: reqwest::Client,
    jar: Arc<Jar>,
    base_url: String,
    headers: HeaderProfile,
    closed: AtomicBool,
}

impl HttpTransport {
    /// 새 전송기 생성 (요청 타임아웃 적용, 두 클라이언트가 쿠키 저장소 공유)
    pub fn new(config: &GatewayConfig) -> Result<Self, CoreError> {
        let jar = Arc::new(Jar::default());
        let client = Self::build_client(config, &jar, reqwest::redirect::Policy::default())?;
        let unfollowed = Self::build_client(config, &jar, reqwest::redirect::Policy::none())?;

        let base_url = config.server.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            unfollowed,
            jar,
            headers: HeaderProfile::new(&base_url, &config.server.user_agent),
            base_url,
            closed: AtomicBool::new(false),
        })
    }

    fn build_client(
        config: &GatewayConfig,
        jar: &Arc<Jar>,
        redirect: reqwest::redirect::Policy,
    ) -> Result<reqwest::Client, CoreError> {
        reqwest::Client::builder()
            .timeout(config.timeouts.http())
            .cookie_provider(jar.clone())
            .redirect(redirect)
            .build()
            .map_err(|e| CoreError::Config(format!("HTTP 클라이언트 빌드 실패: {e}")))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn headers(&self) -> &HeaderProfile {
        &self.headers
    }

    /// 이후 요청을 모두 거부 (소유한 클라이언트 해제 시)
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("HTTP 전송기 종료");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check_open(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            return Err(CoreError::Api("HTTP 클라이언트가 종료됨".to_string()));
        }
        Ok(())
    }

    /// GET 요청 (경로 기준)
    pub async fn get(&self, path: &str, headers: HeaderMap) -> Result<HttpReply, CoreError> {
        self.check_open()?;
        let resp = self
            .client
            .get(self.url(path))
            .headers(headers)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("GET {path} 요청 실패: {e}")))?;
        Self::read_reply(path, resp).await
    }

    /// 폼 인코딩 POST 요청 (경로 기준, 리다이렉트 따라감)
    pub async fn post_form(
        &self,
        path: &str,
        headers: HeaderMap,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, CoreError> {
        self.send_form(&self.client, path, headers, form).await
    }

    /// 폼 인코딩 POST 요청, 리다이렉트 응답을 그대로 반환 (로그인용)
    pub async fn post_form_unfollowed(
        &self,
        path: &str,
        headers: HeaderMap,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, CoreError> {
        self.send_form(&self.unfollowed, path, headers, form).await
    }

    async fn send_form(
        &self,
        client: &reqwest::Client,
        path: &str,
        headers: HeaderMap,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, CoreError> {
        self.check_open()?;
        let resp = client
            .post(self.url(path))
            .headers(headers)
            .form(form)
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("POST {path} 요청 실패: {e}")))?;
        Self::read_reply(path, resp).await
    }

    /// 평문 본문 POST 요청 (절대 URL, 개별 타임아웃)
    pub async fn post_text(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &str,
        timeout: Duration,
    ) -> Result<HttpReply, CoreError> {
        self.check_open()?;
        let resp = self
            .client
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| CoreError::Api(format!("POST {url} 요청 실패: {e}")))?;
        Self::read_reply(url, resp).await
    }

    async fn read_reply(what: &str, resp: reqwest::Response) -> Result<HttpReply, CoreError> {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| CoreError::Api(format!("{what} 응답 본문 읽기 실패: {e}")))?;
        Ok(HttpReply { status, body })
    }

    /// 세션 친화성용 프라이밍 GET: 결과는 버리고 실패도 무시
    pub async fn prime(&self, path: &str, headers: HeaderMap) {
        match self.get(path, headers).await {
            Ok(reply) => debug!("프라이밍 GET {path} -> {}", reply.status),
            Err(e) => debug!("프라이밍 실패 (무시): {e}"),
        }
    }

    /// 로그인 전후/publish 전 쿠키 갱신
    pub async fn prime_cookies(&self) {
        for path in [WEB_ROOT_PATH, "/", TELEMETER_VIEW_PATH] {
            self.prime(path, self.headers.common()).await;
        }
    }

    /// 주어진 URL로 보낼 쿠키 헤더 값 (ws/wss는 http/https로 간주)
    pub fn cookie_header(&self, url: &str) -> Option<String> {
        let http_url = crate::sockjs::http_base(url);
        let parsed = url::Url::parse(&http_url).ok()?;
        self.jar
            .cookies(&parsed)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}
