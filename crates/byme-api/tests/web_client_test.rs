#![allow(clippy::unwrap_used)]
// Integration tests for `WebClient` using wiremock.

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use byme_api::{Error, SetValueOptionals, TlsMode, TransportConfig, WebClient};

const LOGIN_PATH: &str = "/vimarbyweb/modules/system/user_login.php";
const SOAP_PATH: &str = "/cgi-bin/dpadws";
const CERT_PATH: &str = "/vimarbyweb/modules/vimar-byme/script/rootCA.VIMAR.crt";
const ROOT_CA: &str = include_str!("fixtures/rootCA.crt");

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, WebClient) {
    setup_with(TransportConfig::default()).await
}

async fn setup_with(transport: TransportConfig) -> (MockServer, WebClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let password: SecretString = "s3cret".to_string().into();
    let client = WebClient::new(base_url, "admin", password, transport).unwrap();
    (server, client)
}

fn login_body(result: &str, message: &str, session: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <root><result>{result}</result><message>{message}</message>\
         <sessionid>{session}</sessionid></root>"
    )
}

fn soap_body(payload: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <soapenv:Body><service-databasesocketoperationResponse>\
         <status>OK</status><payload>{payload}</payload>\
         </service-databasesocketoperationResponse></soapenv:Body></soapenv:Envelope>"
    )
}

async fn mount_login(server: &MockServer, session: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .and(query_param("op", "login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_body("0", "OK", session)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_stores_session() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .and(query_param("username", "admin"))
        .and(query_param("password", "s3cret"))
        .and(query_param("remember", "0"))
        .and(query_param("op", "login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_body("0", "OK", "abc123")))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client.is_logged());
    assert!(client.login().await.unwrap());
    assert!(client.is_logged());
}

#[tokio::test]
async fn test_login_rejected_is_config_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(login_body("-2", "Wrong password", "")),
        )
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(
        matches!(&result, Err(Error::Config { message }) if message == "Wrong password"),
        "expected Config error, got: {result:?}"
    );
    assert!(!client.is_logged());
}

#[tokio::test]
async fn test_login_without_session_id_returns_false() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_body("0", "OK", "")))
        .mount(&server)
        .await;

    assert!(!client.login().await.unwrap());
    assert!(!client.is_logged());
}

#[tokio::test]
async fn test_login_http_failure_is_connection_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(
        matches!(result, Err(Error::Connection { .. })),
        "expected Connection error, got: {result:?}"
    );
    assert!(client.last_error().unwrap().contains("503"));
}

#[tokio::test]
async fn test_check_login_reuses_existing_session() {
    let (server, client) = setup().await;
    mount_login(&server, "abc123", 1).await;

    assert!(client.check_login().await.unwrap());
    assert!(client.check_login().await.unwrap());

    client.logout();
    assert!(!client.is_logged());
}

// ── Raw requests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_returns_sentinel_on_http_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = client.base_url().join("/broken").unwrap();
    assert!(client.request(url, None, None).await.is_none());
    assert!(client.last_error().is_some());
}

#[tokio::test]
async fn test_request_distinguishes_empty_body_from_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = client.base_url().join("/empty").unwrap();
    assert_eq!(client.request(url, None, None).await.as_deref(), Some(""));
    assert!(client.last_error().is_none());
}

// ── SQL ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_sql_sends_soap_headers_and_decodes_rows() {
    let (server, client) = setup().await;
    mount_login(&server, "sess-1", 1).await;

    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(header("SOAPAction", "dbSoapRequest"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(body_string_contains("<sessionid>sess-1</sessionid>"))
        .and(body_string_contains("<function>DML-SQL</function>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(soap_body(
            "Response: DBMS-OK\nRow000001: 'id','name'\nRow000002: '1','foo'\nRow000003: '2','bar, baz'",
        )))
        .expect(1)
        .mount(&server)
        .await;

    client.check_login().await.unwrap();
    let rows = client.run_sql("SELECT id, name FROM t;").await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], "1");
    assert_eq!(rows[0]["name"], "foo");
    assert_eq!(rows[1]["name"], "bar, baz");
}

#[tokio::test]
async fn test_row_decode_failure_heals_session_on_next_check() {
    let (server, client) = setup().await;
    mount_login(&server, "sess-1", 2).await;

    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(soap_body("session expired")))
        .mount(&server)
        .await;

    client.check_login().await.unwrap();
    let result = client.run_sql("SELECT 1;").await;

    assert!(
        matches!(&result, Err(e) if e.is_session_stale()),
        "expected Payload error, got: {result:?}"
    );
    assert!(!client.is_logged());

    // Exactly one new login; the mock verifies two in total on drop.
    assert!(client.check_login().await.unwrap());
    assert!(client.is_logged());
}

#[tokio::test]
async fn test_rooms_are_cached_per_session() {
    let (server, client) = setup().await;
    mount_login(&server, "sess-1", 1).await;

    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(body_string_contains("_DPAD_DBCONSTANT_GROUP_MAIN"))
        .respond_with(ResponseTemplate::new(200).set_body_string(soap_body(
            "Row000001: 'id','name'\nRow000002: '30','Cucina'\nRow000003: '12','Bagno'",
        )))
        .expect(1)
        .mount(&server)
        .await;

    client.check_login().await.unwrap();
    assert_eq!(client.discover_room_ids().await.unwrap(), "30,12");
    let rooms = client.discover_rooms().await.unwrap();
    assert_eq!(rooms.get("30").unwrap().name, "Cucina");
}

#[tokio::test]
async fn test_room_membership_with_no_rooms_skips_request() {
    let (_server, client) = setup().await;
    assert!(client.select_room_membership("", 0, 300).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_device_status_sends_optionals() {
    let (server, client) = setup().await;
    mount_login(&server, "sess-1", 1).await;

    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(body_string_contains("<idobject>812</idobject>"))
        .and(body_string_contains("<payload>21.5</payload>"))
        .and(body_string_contains("<optionals>SYNCDB</optionals>"))
        .and(body_string_contains("<operation>SETVALUE</operation>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(soap_body("")))
        .expect(1)
        .mount(&server)
        .await;

    client.check_login().await.unwrap();
    client
        .set_device_status("812", "21.5", SetValueOptionals::SyncDb)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_device_status_rejects_non_numeric_id() {
    let (_server, client) = setup().await;
    let result = client
        .set_device_status("812; DROP", "1", SetValueOptionals::None)
        .await;
    assert!(matches!(result, Err(Error::Api { .. })), "got: {result:?}");
}

// ── Certificate ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_install_certificate_reports_changes() {
    let dir = tempfile::tempdir().unwrap();
    let cert_path: PathBuf = dir.path().join("certs").join("rootCA.VIMAR.crt");
    let (server, client) = setup_with(TransportConfig {
        tls: TlsMode::CustomCa(cert_path.clone()),
        ..TransportConfig::default()
    })
    .await;

    Mock::given(method("GET"))
        .and(path(CERT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(ROOT_CA))
        .expect(2)
        .mount(&server)
        .await;

    assert!(client.install_certificate().await.unwrap());
    assert_eq!(std::fs::read_to_string(&cert_path).unwrap(), ROOT_CA);
    assert!(!client.install_certificate().await.unwrap());
}

#[tokio::test]
async fn test_install_certificate_rejects_non_pem() {
    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("rootCA.VIMAR.crt");
    let (server, client) = setup_with(TransportConfig {
        tls: TlsMode::CustomCa(cert_path.clone()),
        ..TransportConfig::default()
    })
    .await;

    Mock::given(method("GET"))
        .and(path(CERT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not found</html>"))
        .mount(&server)
        .await;

    let result = client.install_certificate().await;
    assert!(matches!(result, Err(Error::Api { .. })), "got: {result:?}");
    assert!(!cert_path.exists());
}

#[tokio::test]
async fn test_install_certificate_requires_configured_path() {
    let (_server, client) = setup().await;
    let result = client.install_certificate().await;
    assert!(matches!(result, Err(Error::Api { .. })), "got: {result:?}");
}
