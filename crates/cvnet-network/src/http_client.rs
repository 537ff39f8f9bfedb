//! REST 리소스 클라이언트.
//!
//! 목록/이미지/검침/장치 정보 조회. 401을 받으면 세션 관리자로 한 번
//! 재인증한 뒤 같은 요청을 한 번 재시도하며, 두 번째 401은 `Api` 에러.
//! 목록 응답이 JSON이 아니면 에러 대신 빈 결과를 돌려준다.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use cvnet_core::config::PagingConfig;
use cvnet_core::error::CoreError;
use cvnet_core::models::car_entry::CarEntryPage;
use cvnet_core::models::session::DeviceProfile;
use cvnet_core::models::telemeter::TelemeterReading;
use cvnet_core::models::visitor::VisitorRecord;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::endpoints::{
    CAR_LIST_PATH, CAR_REFERER, DEVICE_INFO_PATH, DEVICE_INFO_TYPE, TELEMETER_PATH, TELEMETER_VIEW_PATH,
    VISITOR_CONTENT_PATH, VISITOR_LIST_PATH, VISITOR_REFERER,
};
use crate::session::SessionManager;
use crate::sockjs::ws_base_from_http;
use crate::transport::{HttpReply, HttpTransport};

/// 패딩 유무와 무관하게 표준 알파벳 base64 디코딩
const IMAGE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// 단일 요청 결과: 401은 재인증 경로로 넘긴다
enum Outcome<T> {
    Done(T),
    Unauthorized,
}

pub struct ResourceClient {
    transport: Arc<HttpTransport>,
    session: Arc<SessionManager>,
    paging: PagingConfig,
}

impl ResourceClient {
    pub fn new(
        transport: Arc<HttpTransport>,
        session: Arc<SessionManager>,
        paging: PagingConfig,
    ) -> Self {
        Self {
            transport,
            session,
            paging,
        }
    }

    /// 요청 실행: 401이면 재인증 1회 + 재시도 1회
    async fn with_reauth<T, F, Fut>(&self, what: &str, op: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Outcome<T>, CoreError>>,
    {
        if let Outcome::Done(value) = op().await? {
            return Ok(value);
        }

        warn!("{what}: 401 응답, 재인증 후 재시도");
        let relogged = self
            .session
            .reauthenticate()
            .await
            .map_err(|e| CoreError::Api(format!("{what}: 재인증 실패: {e}")))?;
        self.refresh_device_after_relogin(relogged).await;

        match op().await? {
            Outcome::Done(value) => Ok(value),
            Outcome::Unauthorized => Err(CoreError::Api(format!("{what}: 재인증 후에도 401"))),
        }
    }

    /// 세션 확인: 만료로 재로그인했으면 장치 정보도 갱신
    async fn authenticate(&self) -> Result<(), CoreError> {
        let relogged = self.session.ensure_authenticated().await?;
        self.refresh_device_after_relogin(relogged).await;
        Ok(())
    }

    async fn refresh_device_after_relogin(&self, relogged: bool) {
        if !relogged {
            return;
        }
        if let Err(e) = self.device_info(DEVICE_INFO_TYPE).await {
            debug!("재로그인 후 장치 정보 갱신 실패 (무시): {e}");
        }
    }

    /// 상태 코드 분류: 200만 성공, 401은 재인증 대상
    fn classify(what: &str, reply: HttpReply) -> Result<Outcome<HttpReply>, CoreError> {
        if reply.is_unauthorized() {
            return Ok(Outcome::Unauthorized);
        }
        if !reply.is_ok() {
            return Err(CoreError::Api(format!(
                "{what} HTTP {}: {}",
                reply.status,
                reply.excerpt()
            )));
        }
        Ok(Outcome::Done(reply))
    }

    /// 장치 정보 조회: 웹소켓 주소/원격 주소/장치 ID를 세션에 기록
    pub async fn device_info(&self, type_hex: &str) -> Result<Value, CoreError> {
        let reply = self
            .transport
            .post_form(
                DEVICE_INFO_PATH,
                self.transport.headers().ajax(),
                &[("type", type_hex)],
            )
            .await?;
        if !reply.is_ok() {
            return Err(CoreError::Api(format!(
                "device_info HTTP {}: {}",
                reply.status,
                reply.excerpt()
            )));
        }
        let json = reply
            .json()
            .ok_or_else(|| CoreError::Api(format!("device_info JSON 아님: {}", reply.excerpt())))?;

        let profile = device_profile(&json);
        debug!("장치 정보: {profile:?}");
        self.session.record_device(profile);
        Ok(json)
    }

    /// 부재중 방문자 목록
    pub async fn list_visitors(&self, page: u32, rows: u32) -> Result<Vec<VisitorRecord>, CoreError> {
        self.authenticate().await?;
        let page = page.max(1);
        let rows = if rows == 0 { self.paging.visitor_rows } else { rows };

        let json = self
            .with_reauth("visitor_list", || {
                self.post_list(VISITOR_REFERER, VISITOR_LIST_PATH, page, rows)
            })
            .await?;

        Ok(match json {
            Some(value) => {
                self.session.mark_successful();
                VisitorRecord::from_list_response(&value)
            }
            None => Vec::new(),
        })
    }

    /// 차량 입출차 목록
    pub async fn list_car_entries(&self, page: u32, rows: u32) -> Result<CarEntryPage, CoreError> {
        self.authenticate().await?;
        let page = page.max(1);
        let rows = if rows == 0 { self.paging.car_rows } else { rows };

        let json = self
            .with_reauth("entrancecar_list", || {
                self.post_list(CAR_REFERER, CAR_LIST_PATH, page, rows)
            })
            .await?;

        Ok(match json {
            Some(value) => {
                self.session.mark_successful();
                CarEntryPage::from_response(&value, page, rows)
            }
            None => CarEntryPage::empty(page, rows),
        })
    }

    /// 참조 페이지 프라이밍 후 목록 POST: JSON이 아니면 `None`
    async fn post_list(
        &self,
        referer: &str,
        path: &str,
        page: u32,
        rows: u32,
    ) -> Result<Outcome<Option<Value>>, CoreError> {
        self.transport
            .prime(referer, self.transport.headers().html())
            .await;

        let page = page.to_string();
        let rows = rows.to_string();
        let reply = self
            .transport
            .post_form(
                path,
                self.transport.headers().form_with_referer(referer),
                &[("pageNo", page.as_str()), ("rows", rows.as_str())],
            )
            .await?;

        Ok(match Self::classify(path, reply)? {
            Outcome::Unauthorized => Outcome::Unauthorized,
            Outcome::Done(reply) => match reply.json() {
                Some(value) => Outcome::Done(Some(value)),
                None => {
                    warn!("{path}: JSON이 아닌 응답, 빈 결과로 처리: {}", reply.excerpt());
                    Outcome::Done(None)
                }
            },
        })
    }

    /// 방문자 이미지 바이트: 없거나 깨졌으면 `None`
    pub async fn fetch_visitor_image(&self, file_name: &str) -> Result<Option<Vec<u8>>, CoreError> {
        if file_name.trim().is_empty() {
            return Err(CoreError::validation("file_name", "비어 있음"));
        }

        let bytes = self
            .with_reauth("visitor_content", || self.post_image(file_name))
            .await?;
        if bytes.is_some() {
            self.session.mark_successful();
        }
        Ok(bytes)
    }

    async fn post_image(&self, file_name: &str) -> Result<Outcome<Option<Vec<u8>>>, CoreError> {
        self.transport
            .prime(VISITOR_REFERER, self.transport.headers().html())
            .await;
        let reply = self
            .transport
            .post_form(
                VISITOR_CONTENT_PATH,
                self.transport.headers().form_with_referer(VISITOR_REFERER),
                &[("file_name", file_name)],
            )
            .await?;

        if reply.is_unauthorized() {
            return Ok(Outcome::Unauthorized);
        }
        if !reply.is_ok() {
            error!(
                "이미지 조회 실패 ({file_name}): HTTP {} - {}",
                reply.status,
                reply.excerpt()
            );
            return Ok(Outcome::Done(None));
        }
        Ok(Outcome::Done(decode_image(file_name, &reply.body)))
    }

    /// 원격 검침 조회
    pub async fn telemeter(&self) -> Result<TelemeterReading, CoreError> {
        self.authenticate().await?;

        let json = self
            .with_reauth("telemetering", || self.post_telemeter())
            .await?;

        Ok(match json {
            Some(value) => {
                self.session.mark_successful();
                TelemeterReading::from_response(&value)
            }
            None => {
                warn!("검침 응답이 JSON이 아님, 빈 값");
                TelemeterReading::default()
            }
        })
    }

    async fn post_telemeter(&self) -> Result<Outcome<Option<Value>>, CoreError> {
        self.transport
            .prime(TELEMETER_VIEW_PATH, self.transport.headers().html())
            .await;
        let reply = self
            .transport
            .post_form(
                TELEMETER_PATH,
                self.transport.headers().form_with_referer(TELEMETER_VIEW_PATH),
                &[],
            )
            .await?;
        Ok(match Self::classify(TELEMETER_PATH, reply)? {
            Outcome::Unauthorized => Outcome::Unauthorized,
            Outcome::Done(reply) => Outcome::Done(reply.json()),
        })
    }

    pub async fn prime_cookies(&self) {
        self.transport.prime_cookies().await;
    }
}

/// device_info 응답에서 장치 프로필 추출
fn device_profile(json: &Value) -> DeviceProfile {
    let text = |key: &str| -> Option<String> {
        match json.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };
    DeviceProfile {
        device_id: text("id"),
        remote_addr: text("tcp_remote_addr"),
        ws_base: text("websock_address").map(|addr| ws_base_from_http(&addr)),
    }
}

/// 이미지 응답 본문(`{"image": "<base64>"}`) 디코딩
fn decode_image(file_name: &str, body: &str) -> Option<Vec<u8>> {
    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) => {
            error!("이미지 응답 JSON 오류 ({file_name}): {e}");
            return None;
        }
    };
    let Some(encoded) = json.get("image").and_then(Value::as_str).filter(|s| !s.is_empty()) else {
        error!("이미지 응답에 image 없음 ({file_name})");
        return None;
    };

    // data URI 헤더(`data:image/jpeg;base64,`) 제거
    let payload = encoded.split_once(',').map_or(encoded, |(_, rest)| rest);
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    match IMAGE_BASE64.decode(cleaned) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!("이미지 base64 디코딩 실패 ({file_name}): {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use cvnet_core::config::GatewayConfig;
    use serde_json::json;

    struct Fixture {
        client: ResourceClient,
        session: Arc<SessionManager>,
    }

    fn fixture(base_url: &str) -> Fixture {
        let mut config = GatewayConfig::default();
        config.server.base_url = base_url.to_string();
        let transport = Arc::new(HttpTransport::new(&config).unwrap());
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            config.session.timeout(),
        ));
        Fixture {
            client: ResourceClient::new(transport, session.clone(), config.paging.clone()),
            session,
        }
    }

    async fn logged_in(server: &mut mockito::Server, logins: usize) -> (Fixture, mockito::Mock) {
        let login = server
            .mock("POST", "/cvnet/web/login.do")
            .with_status(200)
            .with_body(r#"{"result":"1"}"#)
            .expect(logins)
            .create_async()
            .await;
        server
            .mock("GET", "/cvnet/web/telemetering.view")
            .with_status(200)
            .create_async()
            .await;
        let fx = fixture(&server.url());
        fx.session.login("user", "pw").await.unwrap();
        (fx, login)
    }

    #[test]
    fn image_decoding_variants() {
        let raw = b"\xff\xd8\xff\xe0jpeg";
        let plain = json!({"image": STANDARD.encode(raw)}).to_string();
        assert_eq!(decode_image("a", &plain).unwrap(), raw);

        let uri = json!({"image": format!("data:image/jpeg;base64,{}", STANDARD.encode(raw))})
            .to_string();
        assert_eq!(decode_image("a", &uri).unwrap(), raw);

        let unpadded = json!({"image": STANDARD.encode(b"ab").trim_end_matches('=')}).to_string();
        assert_eq!(decode_image("a", &unpadded).unwrap(), b"ab");

        assert!(decode_image("a", "not json").is_none());
        assert!(decode_image("a", r#"{"image":""}"#).is_none());
        assert!(decode_image("a", r#"{"other":1}"#).is_none());
        assert!(decode_image("a", r#"{"image":"!!!***"}"#).is_none());
    }

    #[test]
    fn device_profile_rewrites_scheme() {
        let profile = device_profile(&json!({
            "websock_address": "https://gw.example.com:9099/devicecontrol",
            "tcp_remote_addr": "10.0.0.5",
            "id": 12345
        }));
        assert_eq!(
            profile.ws_base.as_deref(),
            Some("wss://gw.example.com:9099/devicecontrol")
        );
        assert_eq!(profile.remote_addr.as_deref(), Some("10.0.0.5"));
        assert_eq!(profile.device_id.as_deref(), Some("12345"));

        let empty = device_profile(&json!({"websock_address": ""}));
        assert!(empty.ws_base.is_none());
    }

    #[tokio::test]
    async fn list_requires_credentials() {
        let fx = fixture("http://127.0.0.1:1");
        let err = fx.client.list_visitors(1, 5).await.unwrap_err();
        assert!(matches!(err, CoreError::Login(_)));
    }

    #[tokio::test]
    async fn non_json_visitor_list_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let (fx, _login) = logged_in(&mut server, 1).await;
        let list = server
            .mock("POST", "/cvnet/web/visitor_list.do")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("pageNo".into(), "1".into()),
                mockito::Matcher::UrlEncoded("rows".into(), "5".into()),
            ]))
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        // page 0 → 1, rows 0 → 기본값 5
        let visitors = fx.client.list_visitors(0, 0).await.unwrap();
        assert!(visitors.is_empty());
        list.assert_async().await;
    }

    #[tokio::test]
    async fn car_list_is_normalized() {
        let mut server = mockito::Server::new_async().await;
        let (fx, _login) = logged_in(&mut server, 1).await;
        let prime = server
            .mock("GET", "/cvnet/web/enter_car.view")
            .with_status(200)
            .create_async()
            .await;
        server
            .mock("POST", "/cvnet/web/entrancecar_list.do")
            .with_status(200)
            .with_body(
                json!({
                    "page_no": "007",
                    "rows": "5",
                    "exist_next": true,
                    "contents": [{"title": "12가3456", "date_time": "2024-05-01 10:00", "inout": "0"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let page = fx.client.list_car_entries(7, 5).await.unwrap();
        prime.assert_async().await;
        assert_eq!(page.page, 7);
        assert_eq!(page.rows, 5);
        assert!(page.has_next);
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn second_unauthorized_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        // 최초 로그인 + 401 후 재인증
        let (fx, login) = logged_in(&mut server, 2).await;
        let list = server
            .mock("POST", "/cvnet/web/visitor_list.do")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;
        let device = server
            .mock("POST", "/cvnet/web/device_info.do")
            .with_status(200)
            .with_body(r#"{"id":"dev-after-401"}"#)
            .expect(1)
            .create_async()
            .await;

        let err = fx.client.list_visitors(1, 5).await.unwrap_err();
        assert!(matches!(err, CoreError::Api(_)));
        list.assert_async().await;
        login.assert_async().await;
        // 재로그인 직후 장치 정보 갱신
        device.assert_async().await;
        assert_eq!(fx.session.device().device_id.as_deref(), Some("dev-after-401"));
    }

    #[tokio::test]
    async fn expired_session_relogin_refreshes_device() {
        let mut server = mockito::Server::new_async().await;
        let (fx, login) = logged_in(&mut server, 2).await;
        server
            .mock("POST", "/cvnet/web/visitor_list.do")
            .with_status(200)
            .with_body(r#"{"contents":[]}"#)
            .create_async()
            .await;
        let device = server
            .mock("POST", "/cvnet/web/device_info.do")
            .with_status(200)
            .with_body(r#"{"id":"dev-relogin","tcp_remote_addr":"10.0.0.2"}"#)
            .expect(1)
            .create_async()
            .await;

        fx.session.invalidate_session();
        fx.client.list_visitors(1, 5).await.unwrap();
        login.assert_async().await;
        device.assert_async().await;
        assert_eq!(fx.session.device().remote_addr.as_deref(), Some("10.0.0.2"));

        // 신선한 세션에서는 다시 조회하지 않음
        fx.client.list_visitors(1, 5).await.unwrap();
        device.assert_async().await;
    }

    #[tokio::test]
    async fn redirected_list_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let (fx, _login) = logged_in(&mut server, 1).await;
        server
            .mock("POST", "/cvnet/web/visitor_list.do")
            .with_status(302)
            .with_header("location", "/cvnet/web/login.view")
            .create_async()
            .await;
        let landing = server
            .mock("GET", "/cvnet/web/login.view")
            .with_status(200)
            .with_body("<html>login</html>")
            .create_async()
            .await;

        let visitors = fx.client.list_visitors(1, 5).await.unwrap();
        assert!(visitors.is_empty());
        landing.assert_async().await;
    }

    #[tokio::test]
    async fn visitor_image_primes_referer_page() {
        let mut server = mockito::Server::new_async().await;
        let prime = server
            .mock("GET", "/cvnet/web/absence_visitor.view")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/cvnet/web/visitor_content.do")
            .match_body(mockito::Matcher::UrlEncoded("file_name".into(), "v_002.jpg".into()))
            .with_status(200)
            .with_body(json!({"image": "aGVsbG8="}).to_string())
            .create_async()
            .await;

        let fx = fixture(&server.url());
        let image = fx.client.fetch_visitor_image("v_002.jpg").await.unwrap();
        prime.assert_async().await;
        assert_eq!(image.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn server_error_carries_excerpt() {
        let mut server = mockito::Server::new_async().await;
        let (fx, _login) = logged_in(&mut server, 1).await;
        server
            .mock("POST", "/cvnet/web/entrancecar_list.do")
            .with_status(500)
            .with_body("x".repeat(400))
            .create_async()
            .await;

        let err = fx.client.list_car_entries(1, 5).await.unwrap_err();
        let CoreError::Api(message) = err else {
            panic!("Api 에러 기대");
        };
        assert!(message.contains("HTTP 500"));
        assert!(message.len() < 260);
    }

    #[tokio::test]
    async fn missing_image_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/cvnet/web/visitor_content.do")
            .with_status(200)
            .with_body(r#"{"result":"1"}"#)
            .create_async()
            .await;

        let fx = fixture(&server.url());
        let image = fx.client.fetch_visitor_image("v_001.jpg").await.unwrap();
        assert!(image.is_none());

        let err = fx.client.fetch_visitor_image(" ").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn device_info_records_profile() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/cvnet/web/device_info.do")
            .match_body(mockito::Matcher::UrlEncoded("type".into(), "0x12".into()))
            .with_status(200)
            .with_body(r#"{"websock_address":"http://gw:9099/devicecontrol","id":"dev-7"}"#)
            .create_async()
            .await;

        let fx = fixture(&server.url());
        fx.client.device_info("0x12").await.unwrap();
        let device = fx.session.device();
        assert_eq!(device.ws_base.as_deref(), Some("ws://gw:9099/devicecontrol"));
        assert_eq!(device.device_id.as_deref(), Some("dev-7"));
    }

    #[tokio::test]
    async fn telemeter_reading() {
        let mut server = mockito::Server::new_async().await;
        let (fx, _login) = logged_in(&mut server, 1).await;
        server
            .mock("POST", "/cvnet/web/telemetering.do")
            .with_status(200)
            .with_body(r#"{"electric":"321.5","water":"10","gas":"oops"}"#)
            .create_async()
            .await;

        let reading = fx.client.telemeter().await.unwrap();
        assert_eq!(reading.electric, Some(321.5));
        assert_eq!(reading.water, Some(10.0));
        assert!(reading.gas.is_none());
    }
}
