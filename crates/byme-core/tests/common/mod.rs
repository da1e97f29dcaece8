// Shared wiremock fixtures for the By-me web server.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use byme_api::{TransportConfig, WebClient};
use byme_core::{ControllerConfig, PollInterval, Scheme};

pub const LOGIN_PATH: &str = "/vimarbyweb/modules/system/user_login.php";
pub const SOAP_PATH: &str = "/cgi-bin/dpadws";

/// Substrings that identify each fixed statement inside an envelope.
pub const REMOTE_DEVICES: &str = "IS_VISIBLE";
pub const ROOMS: &str = "_DPAD_DBCONSTANT_GROUP_MAIN";
pub const MEMBERSHIP: &str = "GROUP_CONCAT(r2.PARENTID)";
pub const SINGLE_STATUS: &str = "r3.PARENTID = ";

pub const REMOTE_ROWS: &str = "Response: DBMS-OK\n\
Row000001: 'room_ids','object_id','object_name','object_type','status_id','status_name','status_range','status_value'\n\
Row000002: '','10','LUCE 1 CUCINA','CH_Main_Automation','101','on/off','','1'\n\
Row000003: '','11','TERMOSTATO SALA','CH_Clima','111','setpoint','min=5|max=35','21.0'\n\
Row000004: '','11','TERMOSTATO SALA','CH_Clima','112','funzionamento','','6'";

pub const ROOM_ROWS: &str = "Row000001: 'id','name'\nRow000002: '30','Cucina'\nRow000003: '31','Sala'";

pub const MEMBERSHIP_ROWS: &str =
    "Row000001: 'room_ids','object_id'\nRow000002: '30','10'\nRow000003: '31','11'\nRow000004: '30','99'";

pub fn soap(payload: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <soapenv:Body><service-databasesocketoperationResponse>\
         <payload>{payload}</payload>\
         </service-databasesocketoperationResponse></soapenv:Body></soapenv:Envelope>"
    ))
}

pub async fn mount_login(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<root><result>0</result><message>OK</message><sessionid>sess-1</sessionid></root>",
        ))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_query(server: &MockServer, marker: &str, payload: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(body_string_contains(marker))
        .respond_with(soap(payload))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn logged_in_client(server: &MockServer) -> Arc<WebClient> {
    let base_url = Url::parse(&server.uri()).unwrap();
    let password: SecretString = "s3cret".to_string().into();
    let client = WebClient::new(base_url, "admin", password, TransportConfig::default()).unwrap();
    assert!(client.check_login().await.unwrap());
    Arc::new(client)
}

pub fn controller_config(server: &MockServer) -> ControllerConfig {
    let address = server.address();
    ControllerConfig {
        host: address.ip().to_string(),
        port: address.port(),
        scheme: Scheme::Http,
        password: "s3cret".to_string().into(),
        poll_interval: PollInterval::Fixed(std::time::Duration::from_secs(3600)),
        ..ControllerConfig::default()
    }
}
