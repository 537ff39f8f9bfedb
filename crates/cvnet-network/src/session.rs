//! 세션 관리자: 자격증명, 신선도 시계, 재인증 판단.
//!
//! 자격증명은 명시적 로그인이 성공했을 때만 교체된다. 만료된 세션의
//! 재로그인은 `reauth_lock`으로 단일 비행(single flight) 처리한다.

use chrono::{DateTime, Utc};
use cvnet_core::error::CoreError;
use cvnet_core::models::session::{DeviceProfile, SessionDiagnostics};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::endpoints::{LOGIN_PATH, TELEMETER_VIEW_PATH};
use crate::transport::HttpTransport;

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Default)]
struct SessionState {
    credentials: Option<Credentials>,
    last_success: Option<DateTime<Utc>>,
    device: DeviceProfile,
}

/// 제어 채널 로그인/명령 envelope에 싣는 신원
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub id: String,
    pub remote_addr: String,
    pub password: String,
}

/// 장치 정보가 없을 때 쓰는 원격 주소
const DEFAULT_REMOTE_ADDR: &str = "127.0.0.1";

/// 자격증명을 모를 때 채널 로그인 비밀번호
const DEFAULT_CHANNEL_PASSWORD: &str = "cvnet";

pub struct SessionManager {
    transport: Arc<HttpTransport>,
    state: RwLock<SessionState>,
    timeout: chrono::Duration,
    reauth_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(transport: Arc<HttpTransport>, timeout: chrono::Duration) -> Self {
        Self {
            transport,
            state: RwLock::new(SessionState::default()),
            timeout,
            reauth_lock: Mutex::new(()),
        }
    }

    /// 사용자명/비밀번호 로그인
    ///
    /// 1. 폼 POST (비-200 → `Login`)
    /// 2. JSON `result`가 실패 표식이면 `Login`
    /// 3. 쿠키 프라이밍 후 검증 GET (401 → `Login`)
    ///
    /// 실패 시 기존 자격증명과 신선도는 그대로 둔다.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), CoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CoreError::validation("username", "비어 있음"));
        }
        if password.is_empty() {
            return Err(CoreError::validation("password", "비어 있음"));
        }

        debug!("로그인 시도: {username}");
        let reply = self
            .transport
            .post_form_unfollowed(
                LOGIN_PATH,
                self.transport.headers().ajax(),
                &[
                    ("id", username),
                    ("password", password),
                    ("deviceId", "0"),
                    ("tokenId", "0"),
                ],
            )
            .await
            .map_err(|e| CoreError::Login(e.to_string()))?;

        if !reply.is_ok() {
            return Err(CoreError::Login(format!(
                "login HTTP {}: {}",
                reply.status,
                reply.excerpt()
            )));
        }

        if let Some(json) = reply.json() {
            if let Some(message) = rejection_message(&json) {
                return Err(CoreError::Login(message));
            }
        }

        self.transport.prime_cookies().await;

        let check = self
            .transport
            .get(TELEMETER_VIEW_PATH, self.transport.headers().common())
            .await
            .map_err(|e| CoreError::Login(format!("로그인 검증 실패: {e}")))?;
        if check.is_unauthorized() {
            return Err(CoreError::Login(
                "로그인 후 검증 요청이 401을 반환".to_string(),
            ));
        }

        {
            let mut state = self.state.write();
            state.credentials = Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            });
            state.last_success = Some(Utc::now());
        }
        info!("로그인 성공: {username}");
        Ok(())
    }

    /// 만료된 세션이면 캐시된 자격증명으로 한 번 재로그인 (이 호출이 재로그인했으면 true)
    pub async fn ensure_authenticated(&self) -> Result<bool, CoreError> {
        if self.cached_credentials().is_none() {
            return Err(CoreError::Login("저장된 자격증명 없음".to_string()));
        }
        if !self.is_expired() {
            return Ok(false);
        }

        let _guard = self.reauth_lock.lock().await;
        // 대기 중 다른 호출자가 이미 재로그인했으면 생략
        if !self.is_expired() {
            return Ok(false);
        }
        let creds = self
            .cached_credentials()
            .ok_or_else(|| CoreError::Login("저장된 자격증명 없음".to_string()))?;
        info!("세션 만료, 재로그인");
        self.login(&creds.username, &creds.password).await?;
        Ok(true)
    }

    /// 401 응답 후 무조건 한 번 재로그인 (다른 호출자가 먼저 끝냈으면 false)
    pub async fn reauthenticate(&self) -> Result<bool, CoreError> {
        let seen = self.state.read().last_success;
        let _guard = self.reauth_lock.lock().await;
        let current = self.state.read().last_success;
        if current.is_some() && current != seen {
            debug!("다른 호출자가 재로그인 완료, 생략");
            return Ok(false);
        }
        let creds = self
            .cached_credentials()
            .ok_or_else(|| CoreError::Login("저장된 자격증명 없음".to_string()))?;
        warn!("401 응답, 재로그인 시도");
        self.login(&creds.username, &creds.password).await?;
        Ok(true)
    }

    pub fn mark_successful(&self) {
        self.state.write().last_success = Some(Utc::now());
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// 주어진 시각 기준 만료 여부 (부수 효과 없음)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.state.read().last_success {
            None => true,
            Some(last) => now - last > self.timeout,
        }
    }

    /// 신선도 초기화: 다음 읽기 호출이 재로그인한다
    pub fn invalidate_session(&self) {
        self.state.write().last_success = None;
        debug!("세션 무효화");
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let now = Utc::now();
        let (has_credentials, username, last) = {
            let state = self.state.read();
            (
                state.credentials.is_some(),
                state.credentials.as_ref().map(|c| c.username.clone()),
                state.last_success,
            )
        };
        SessionDiagnostics {
            has_credentials,
            username,
            last_successful_at: last,
            is_expired: self.is_expired_at(now),
            hours_since_success: last.map(|t| (now - t).num_seconds() as f64 / 3600.0),
        }
    }

    pub fn record_device(&self, profile: DeviceProfile) {
        self.state.write().device.merge(profile);
    }

    pub fn device(&self) -> DeviceProfile {
        self.state.read().device.clone()
    }

    /// 채널 신원: id는 장치 ID → 사용자명 → 클라이언트 ID 순
    pub fn channel_identity(&self, client_id: &str) -> ChannelIdentity {
        let state = self.state.read();
        let username = state.credentials.as_ref().map(|c| c.username.clone());
        ChannelIdentity {
            id: state
                .device
                .device_id
                .clone()
                .or(username)
                .unwrap_or_else(|| client_id.to_string()),
            remote_addr: state
                .device
                .remote_addr
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_ADDR.to_string()),
            password: state
                .credentials
                .as_ref()
                .map(|c| c.password.clone())
                .unwrap_or_else(|| DEFAULT_CHANNEL_PASSWORD.to_string()),
        }
    }

    fn cached_credentials(&self) -> Option<Credentials> {
        self.state.read().credentials.clone()
    }
}

/// 로그인 응답 JSON이 실패를 표시하면 메시지 반환
fn rejection_message(json: &Value) -> Option<String> {
    let result = json.get("result")?;
    let flag = match result {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    if !matches!(flag.as_str(), "0" | "fail" | "false") {
        return None;
    }
    Some(
        json.get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("Invalid credentials")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvnet_core::config::GatewayConfig;
    use serde_json::json;

    fn manager_for(base_url: &str) -> SessionManager {
        let mut config = GatewayConfig::default();
        config.server.base_url = base_url.to_string();
        let transport = Arc::new(HttpTransport::new(&config).unwrap());
        SessionManager::new(transport, config.session.timeout())
    }

    async fn mock_login_ok(
        server: &mut mockito::Server,
        logins: usize,
    ) -> (mockito::Mock, mockito::Mock) {
        let login = server
            .mock("POST", "/cvnet/web/login.do")
            .with_status(200)
            .with_body(r#"{"result":"1"}"#)
            .expect(logins)
            .create_async()
            .await;
        let check = server
            .mock("GET", "/cvnet/web/telemetering.view")
            .with_status(200)
            .with_body("<html></html>")
            .expect_at_least(1)
            .create_async()
            .await;
        (login, check)
    }

    #[test]
    fn rejection_flags() {
        assert_eq!(
            rejection_message(&json!({"result": "FAIL"})).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(
            rejection_message(&json!({"result": 0, "message": "비밀번호 오류"})).as_deref(),
            Some("비밀번호 오류")
        );
        assert_eq!(rejection_message(&json!({"result": false})).as_deref(), Some("Invalid credentials"));
        assert!(rejection_message(&json!({"result": "1"})).is_none());
        assert!(rejection_message(&json!({"ok": true})).is_none());
    }

    #[test]
    fn expiry_is_monotonic_in_elapsed_time() {
        let manager = manager_for("http://127.0.0.1:1");
        let now = Utc::now();
        assert!(manager.is_expired_at(now));

        manager.mark_successful();
        let base = Utc::now();
        assert!(!manager.is_expired_at(base));
        assert!(!manager.is_expired_at(base + chrono::Duration::hours(23)));
        assert!(manager.is_expired_at(base + chrono::Duration::hours(25)));
        assert!(manager.is_expired_at(base + chrono::Duration::days(30)));
    }

    #[test]
    fn invalidate_forces_expiry() {
        let manager = manager_for("http://127.0.0.1:1");
        manager.mark_successful();
        assert!(!manager.is_expired());
        manager.invalidate_session();
        assert!(manager.is_expired());
    }

    #[tokio::test]
    async fn empty_fields_are_validation_errors() {
        let manager = manager_for("http://127.0.0.1:1");
        let err = manager.login("  ", "pw").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "username"));
        let err = manager.login("user", "").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "password"));
    }

    #[tokio::test]
    async fn login_then_not_expired() {
        let mut server = mockito::Server::new_async().await;
        let (login, _check) = mock_login_ok(&mut server, 1).await;

        let manager = manager_for(&server.url());
        tokio_test::assert_ok!(manager.login(" user ", "pw").await);
        login.assert_async().await;

        assert!(!manager.is_expired());
        let diag = manager.diagnostics();
        assert!(diag.has_credentials);
        assert_eq!(diag.username.as_deref(), Some("user"));
        assert!(diag.hours_since_success.unwrap() < 0.01);
    }

    #[tokio::test]
    async fn rejected_login_keeps_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/cvnet/web/login.do")
            .with_status(200)
            .with_body(r#"{"result":"fail","message":"bad password"}"#)
            .create_async()
            .await;

        let manager = manager_for(&server.url());
        let err = manager.login("user", "wrong").await.unwrap_err();
        assert!(matches!(err, CoreError::Login(ref m) if m == "bad password"));
        assert!(manager.is_expired());
        assert!(!manager.diagnostics().has_credentials);
    }

    #[tokio::test]
    async fn login_http_error_carries_excerpt() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/cvnet/web/login.do")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let manager = manager_for(&server.url());
        let err = manager.login("user", "pw").await.unwrap_err();
        assert!(matches!(err, CoreError::Login(ref m) if m == "login HTTP 503: maintenance"));
    }

    #[tokio::test]
    async fn login_redirect_is_not_followed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/cvnet/web/login.do")
            .with_status(302)
            .with_header("location", "/cvnet/web/login.view")
            .create_async()
            .await;
        let landing = server
            .mock("GET", "/cvnet/web/login.view")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let manager = manager_for(&server.url());
        let err = manager.login("user", "pw").await.unwrap_err();
        assert!(matches!(err, CoreError::Login(ref m) if m.starts_with("login HTTP 302")));
        landing.assert_async().await;
        assert!(!manager.diagnostics().has_credentials);
    }

    #[tokio::test]
    async fn verification_401_fails_login() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/cvnet/web/login.do")
            .with_status(200)
            .with_body("OK")
            .create_async()
            .await;
        server
            .mock("GET", "/cvnet/web/telemetering.view")
            .with_status(401)
            .create_async()
            .await;

        let manager = manager_for(&server.url());
        let err = manager.login("user", "pw").await.unwrap_err();
        assert!(matches!(err, CoreError::Login(_)));
    }

    #[tokio::test]
    async fn ensure_authenticated_without_credentials() {
        let manager = manager_for("http://127.0.0.1:1");
        let err = manager.ensure_authenticated().await.unwrap_err();
        assert!(matches!(err, CoreError::Login(_)));
    }

    #[tokio::test]
    async fn ensure_authenticated_relogs_once_when_expired() {
        let mut server = mockito::Server::new_async().await;
        let (login, _check) = mock_login_ok(&mut server, 2).await;

        let manager = manager_for(&server.url());
        manager.login("user", "pw").await.unwrap();
        manager.invalidate_session();

        let (a, b) = tokio::join!(manager.ensure_authenticated(), manager.ensure_authenticated());
        let relogged = [a.unwrap(), b.unwrap()];
        assert_eq!(relogged.iter().filter(|r| **r).count(), 1);
        // 최초 로그인 1회 + 단일 비행 재로그인 1회
        login.assert_async().await;
        assert!(!manager.is_expired());
    }

    #[test]
    fn identity_falls_back_in_order() {
        let manager = manager_for("http://127.0.0.1:1");
        let identity = manager.channel_identity("homeassistant");
        assert_eq!(identity.id, "homeassistant");
        assert_eq!(identity.remote_addr, "127.0.0.1");

        manager.record_device(DeviceProfile {
            device_id: Some("dev-9".into()),
            remote_addr: Some("10.1.2.3".into()),
            ws_base: None,
        });
        let identity = manager.channel_identity("homeassistant");
        assert_eq!(identity.id, "dev-9");
        assert_eq!(identity.remote_addr, "10.1.2.3");
    }
}
