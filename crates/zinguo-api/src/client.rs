// Zinguo cloud HTTP client
//
// Wraps `reqwest::Client` with vendor URL construction, token headers and
// response classification. Every public method is one logical operation and
// is bounded by the configured timeout. Response bodies are always read as
// text and parsed as JSON by hand: the server mislabels its content type.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{Authenticated, Credentials};
use crate::error::Error;
use crate::models::{DeviceSummary, LoginRequest, LoginResponse, RawDeviceRecord};
use crate::transport::TransportConfig;

/// Header carrying the session token on authenticated calls.
pub const TOKEN_HEADER: &str = "x-access-token";

/// Body marker the server uses for a rejected token on a non-200 response
/// (matched case-insensitively). A 200 body is never inspected for it.
pub const INVALID_TOKEN_MARKER: &str = "invalid_token";

const BODY_PREVIEW_CHARS: usize = 200;

/// Raw HTTP client for the Zinguo cloud API.
///
/// Stateless apart from the pooled connection: endpoint and token are passed
/// per call. Session bookkeeping lives in [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct ZinguoClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl ZinguoClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            timeout: transport.timeout,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Log in against one base endpoint.
    ///
    /// `POST {endpoint}/customer/login` with `{account, password: sha1_hex}`.
    /// HTTP 401 maps to [`Error::InvalidCredentials`]; any other non-200
    /// status or a body without a token maps to [`Error::Authentication`].
    pub async fn login(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> Result<SecretString, Error> {
        self.bounded(async {
            let url = endpoint_url(endpoint, "customer/login")?;
            debug!(%url, account = credentials.account(), "logging in");

            let body = LoginRequest {
                account: credentials.account(),
                password: credentials.password_digest(),
            };

            // The app sends JSON labelled as text/plain; `.json()` keeps an
            // existing content type.
            let resp = self
                .http
                .post(url)
                .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            let text = resp.text().await?;
            trace!(%status, body = %preview(&text), "login response");

            if status == StatusCode::UNAUTHORIZED {
                return Err(Error::InvalidCredentials {
                    account: credentials.account().to_owned(),
                });
            }
            if status != StatusCode::OK {
                return Err(Error::Authentication {
                    message: format!("login failed (HTTP {status}): {}", preview(&text)),
                });
            }

            let parsed: LoginResponse = parse_json(&text)?;
            match parsed.token {
                Some(token) if !token.is_empty() => {
                    debug!("login successful");
                    Ok(SecretString::from(token))
                }
                _ => Err(Error::Authentication {
                    message: format!("login response carried no token: {}", preview(&text)),
                }),
            }
        })
        .await
    }

    /// List every device bound to the account.
    ///
    /// `GET {endpoint}/customer/devices`
    pub async fn list_devices(&self, auth: &Authenticated) -> Result<Vec<DeviceSummary>, Error> {
        self.bounded(async {
            let url = endpoint_url(&auth.endpoint, "customer/devices")?;
            debug!(%url, "listing devices");
            let resp = self
                .http
                .get(url)
                .header(TOKEN_HEADER, auth.token.expose_secret())
                .send()
                .await?;
            let text = read_authenticated(resp).await?;
            parse_json(&text)
        })
        .await
    }

    /// Fetch the raw record of one device.
    ///
    /// `GET {endpoint}/device/getDeviceByMac?mac=...`
    pub async fn get_device_by_mac(
        &self,
        auth: &Authenticated,
        mac: &str,
    ) -> Result<RawDeviceRecord, Error> {
        self.bounded(async {
            let url = endpoint_url(&auth.endpoint, "device/getDeviceByMac")?;
            debug!(%url, mac, "fetching device");
            let resp = self
                .http
                .get(url)
                .query(&[("mac", mac)])
                .header(TOKEN_HEADER, auth.token.expose_secret())
                .send()
                .await?;
            let text = read_authenticated(resp).await?;
            parse_json(&text)
        })
        .await
    }

    /// Send a full control payload.
    ///
    /// `PUT {endpoint}/wifiyuba/yuBaControl`
    pub async fn control(
        &self,
        auth: &Authenticated,
        payload: &(impl Serialize + Sync),
    ) -> Result<(), Error> {
        self.bounded(async {
            let url = endpoint_url(&auth.endpoint, "wifiyuba/yuBaControl")?;
            debug!(%url, "sending control payload");
            let resp = self
                .http
                .put(url)
                .header(TOKEN_HEADER, auth.token.expose_secret())
                .json(payload)
                .send()
                .await?;
            let text = read_authenticated(resp).await?;
            trace!(body = %preview(&text), "control acknowledged");
            Ok(())
        })
        .await
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Run one operation under the time budget. A timeout raised by a
    /// caller-supplied `reqwest::Client` reports the same budget.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        let timed_out = || Error::Timeout {
            timeout_secs: self.timeout.as_secs(),
        };
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Err(Error::Transport(e))) if e.is_timeout() => Err(timed_out()),
            Ok(result) => result,
            Err(_) => Err(timed_out()),
        }
    }
}

/// Build `{endpoint}/{path}` without `Url::join` eating the last segment
/// of `/api/v1`.
pub(crate) fn endpoint_url(endpoint: &Url, path: &str) -> Result<Url, Error> {
    let base = endpoint.as_str().trim_end_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Classify an authenticated response, returning the body on HTTP 200.
async fn read_authenticated(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let text = resp.text().await?;

    if status == StatusCode::OK {
        return Ok(text);
    }

    if is_token_rejection(status, &text) {
        debug!(%status, "token rejected by server");
        return Err(Error::TokenExpired);
    }

    Err(Error::Api {
        status: status.as_u16(),
        body: text,
    })
}

/// A non-200 response is a token rejection on 401 or when the body carries
/// [`INVALID_TOKEN_MARKER`].
fn is_token_rejection(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNAUTHORIZED
        || body.to_ascii_lowercase().contains(INVALID_TOKEN_MARKER)
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
