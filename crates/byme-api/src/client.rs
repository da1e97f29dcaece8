// Session-holding HTTP client
//
// Wraps `reqwest::Client` with By-me URL construction, the session token,
// and the failure bookkeeping the poll loop relies on. Endpoint groups
// (auth, SQL queries) are inherent methods in separate files to keep this
// module focused on transport mechanics.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace, warn};
use url::Url;

use crate::codec::{self, ResponseDocument};
use crate::error::Error;
use crate::models::{Row, RoomIndex};
use crate::transport::TransportConfig;

/// Endpoint that accepts the SOAP-shaped remote procedure calls.
pub(crate) const SOAP_PATH: &str = "/cgi-bin/dpadws";

/// Raw HTTP client for the By-me web server.
///
/// Holds at most one session. Ordinary network failures never surface as
/// errors from [`request`](Self::request); they are recorded and reported
/// through a `None` result so callers can tell "no data" from "empty data".
pub struct WebClient {
    http: RwLock<reqwest::Client>,
    base_url: Url,
    transport: TransportConfig,
    pub(crate) username: String,
    pub(crate) password: SecretString,
    session_id: RwLock<Option<SecretString>>,
    last_error: RwLock<Option<String>>,
    /// Room list for the current session. Dropped with the session.
    pub(crate) rooms: RwLock<Option<RoomIndex>>,
}

impl WebClient {
    /// Create a new client. Does not log in.
    ///
    /// `base_url` is the web server root, e.g. `https://192.168.1.20:443`.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
        transport: TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http: RwLock::new(http),
            base_url,
            transport,
            username: username.into(),
            password,
            session_id: RwLock::new(None),
            last_error: RwLock::new(None),
            rooms: RwLock::new(None),
        })
    }

    /// Build the base URL from its parts.
    pub fn base_url_for(scheme: &str, host: &str, port: u16) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{scheme}://{host}:{port}"))?)
    }

    /// The web server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Detail of the most recent failed request, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().expect("last_error lock poisoned").clone()
    }

    // ── Session management ─────────────────────────────────────────

    /// `true` if a session token is held. No I/O.
    pub fn is_logged(&self) -> bool {
        self.session_id
            .read()
            .expect("session lock poisoned")
            .is_some()
    }

    pub(crate) fn set_session(&self, session_id: String) {
        debug!("storing session token");
        *self.session_id.write().expect("session lock poisoned") =
            Some(SecretString::from(session_id));
    }

    /// Forget the session so the next call logs in again.
    ///
    /// The room cache belongs to the session and is dropped with it.
    pub fn clear_session(&self) {
        let had_session = self
            .session_id
            .write()
            .expect("session lock poisoned")
            .take()
            .is_some();
        *self.rooms.write().expect("rooms lock poisoned") = None;
        if had_session {
            debug!("session cleared, next request will log in again");
        }
    }

    /// Session token for envelope construction (empty when logged out).
    pub(crate) fn session_token(&self) -> String {
        self.session_id
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|s| s.expose_secret().to_owned())
            .unwrap_or_default()
    }

    pub(crate) fn replace_http(&self, http: reqwest::Client) {
        *self.http.write().expect("http lock poisoned") = http;
    }

    fn http(&self) -> reqwest::Client {
        self.http.read().expect("http lock poisoned").clone()
    }

    // ── URL builders ───────────────────────────────────────────────

    /// Join an absolute path onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Request helpers ────────────────────────────────────────────

    /// Issue a GET (no body) or POST (with body).
    ///
    /// Returns the response text, or `None` on HTTP error status, timeout,
    /// or any transport failure. The failure detail is kept for
    /// [`last_error`](Self::last_error).
    pub async fn request(
        &self,
        url: Url,
        body: Option<String>,
        headers: Option<reqwest::header::HeaderMap>,
    ) -> Option<String> {
        let http = self.http();
        let builder = match body {
            Some(body) => {
                debug!("POST {}", url.path());
                http.post(url).body(body)
            }
            None => {
                debug!("GET {}", url.path());
                http.get(url)
            }
        };
        let builder = match headers {
            Some(headers) => builder.headers(headers),
            None => builder,
        };

        let outcome = match builder.send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp.text().await.map_err(|e| describe(&e)),
                Err(e) => Err(describe(&e)),
            },
            Err(e) => Err(describe(&e)),
        };

        match outcome {
            Ok(text) => {
                trace!(bytes = text.len(), "response received");
                *self.last_error.write().expect("last_error lock poisoned") = None;
                Some(text)
            }
            Err(detail) => {
                warn!("request failed: {detail}");
                *self.last_error.write().expect("last_error lock poisoned") = Some(detail);
                None
            }
        }
    }

    /// Send an envelope to the SOAP endpoint and parse the outer XML.
    ///
    /// A failed request or a response that does not parse means the session
    /// is stale: it is cleared here and the error handed back, so recovery
    /// happens on the caller's next cycle rather than by retrying in-line.
    pub(crate) async fn post_envelope(&self, envelope: String) -> Result<ResponseDocument, Error> {
        let url = self.url(SOAP_PATH)?;
        let Some(text) = self
            .request(url, Some(envelope), Some(self.soap_headers()))
            .await
        else {
            self.clear_session();
            return Err(self.connection_error());
        };

        codec::decode_response(&text).inspect_err(|e| {
            warn!(error = %e, "unparseable SOAP response, dropping session");
            self.clear_session();
        })
    }

    /// Run a SELECT statement and decode its rows.
    ///
    /// Row-decode failure is the strongest sign of an expired session, so
    /// it clears the session exactly like an XML failure does.
    pub async fn run_sql(&self, statement: &str) -> Result<Vec<Row>, Error> {
        let envelope = codec::encode_sql(&self.session_token(), statement);
        let doc = self.post_envelope(envelope).await?;

        let Some(payload) = doc.payload() else {
            self.clear_session();
            return Err(Error::Payload {
                message: "response has no payload element".into(),
            });
        };

        codec::decode_rows(payload).inspect_err(|e| {
            warn!(error = %e, "row payload rejected, dropping session");
            self.clear_session();
        })
    }

    pub(crate) fn connection_error(&self) -> Error {
        Error::Connection {
            message: self
                .last_error()
                .unwrap_or_else(|| "request failed".into()),
        }
    }

    fn soap_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, REFERER};

        let mut headers = HeaderMap::new();
        headers.insert("SOAPAction", HeaderValue::from_static("dbSoapRequest"));
        headers.insert("SOAPServer", HeaderValue::from_static(""));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=\"UTF-8\""),
        );
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        let referer = format!(
            "{}/vimarbyweb/modules/vimar-byme/",
            self.base_url.as_str().trim_end_matches('/')
        );
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }
        headers
    }
}

pub(crate) fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else if let Some(status) = err.status() {
        format!("HTTP {status}")
    } else {
        err.to_string()
    }
}
