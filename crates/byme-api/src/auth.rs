// Session authentication and CA certificate installation
//
// The login endpoint is a plain GET carrying the credentials as query
// parameters; it answers with a tiny XML document holding a result code,
// a message and the session id that every later envelope must carry.

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::client::{WebClient, describe};
use crate::codec;
use crate::error::Error;

const LOGIN_PATH: &str = "/vimarbyweb/modules/system/user_login.php";
const CERTIFICATE_PATH: &str = "/vimarbyweb/modules/vimar-byme/script/rootCA.VIMAR.crt";

impl WebClient {
    /// Authenticate with the configured username/password.
    ///
    /// Returns `Ok(true)` once a session token is stored. `Ok(false)` means
    /// the server accepted the login but handed back no session id.
    /// Transport failure is [`Error::Connection`]; rejected credentials are
    /// [`Error::Config`].
    pub async fn login(&self) -> Result<bool, Error> {
        let mut url = self.url(LOGIN_PATH)?;
        url.query_pairs_mut()
            .append_pair("sessionid", "")
            .append_pair("username", &self.username)
            .append_pair("password", self.password.expose_secret())
            .append_pair("remember", "0")
            .append_pair("op", "login");

        debug!(username = %self.username, "logging in");

        let text = self
            .request(url, None, None)
            .await
            .ok_or_else(|| self.connection_error())?;

        let doc = codec::decode_response(&text).map_err(|e| Error::Api {
            message: format!("unreadable login response: {e}"),
        })?;

        let code = doc.find("result").map(str::trim).unwrap_or_default();
        if code != "0" {
            let message = doc
                .find("message")
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map_or_else(|| format!("login rejected (code {code:?})"), str::to_owned);
            return Err(Error::Config { message });
        }

        match doc.find("sessionid").map(str::trim) {
            Some(session) if !session.is_empty() => {
                self.set_session(session.to_owned());
                info!("login successful");
                Ok(true)
            }
            _ => {
                warn!("login accepted but no session id returned");
                Ok(false)
            }
        }
    }

    /// Make sure a session exists, logging in if it does not.
    pub async fn check_login(&self) -> Result<bool, Error> {
        if self.is_logged() {
            return Ok(true);
        }
        self.login().await
    }

    /// Drop the local session. The web server expires it on its own.
    pub fn logout(&self) {
        self.clear_session();
    }

    /// Download the web server's root CA certificate to the configured path.
    ///
    /// Returns whether the file on disk changed. The download itself runs
    /// without certificate verification. After a change the HTTP client is
    /// rebuilt so later requests verify against the new file.
    pub async fn install_certificate(&self) -> Result<bool, Error> {
        let Some(path) = self.transport().certificate_path().cloned() else {
            return Err(Error::Api {
                message: "no certificate path configured".into(),
            });
        };

        let url = self.url(CERTIFICATE_PATH)?;
        debug!("downloading CA certificate from {}", url.path());

        let http = self.transport().unverified().build_client()?;
        let resp = http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Connection {
                message: describe(&e),
            })?;
        let pem = resp.bytes().await.map_err(|e| Error::Connection {
            message: describe(&e),
        })?;

        let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| Error::Api {
            message: format!("downloaded certificate is not valid PEM: {e}"),
        })?;
        if certs.is_empty() {
            return Err(Error::Api {
                message: "downloaded file contains no certificate".into(),
            });
        }

        if tokio::fs::read(&path).await.ok().as_deref() == Some(pem.as_ref()) {
            debug!(path = %path.display(), "CA certificate unchanged");
            return Ok(false);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Api {
                    message: format!("cannot create {}: {e}", parent.display()),
                })?;
        }
        tokio::fs::write(&path, &pem).await.map_err(|e| Error::Api {
            message: format!("failed to save certificate to {}: {e}", path.display()),
        })?;
        info!(path = %path.display(), "CA certificate installed");

        self.replace_http(self.transport().build_client()?);
        Ok(true)
    }
}
