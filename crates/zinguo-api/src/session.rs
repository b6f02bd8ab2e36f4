// Session management
//
// Owns the credentials, the token and the pinned base endpoint. The first
// login probes the candidate endpoints in order; the first one that hands
// out a token is pinned for the life of the session, and every later
// re-login goes to that endpoint only.

use secrecy::SecretString;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{Authenticated, Credentials};
use crate::client::ZinguoClient;
use crate::error::Error;

/// Vendor backends, in probe order.
pub const DEFAULT_ENDPOINTS: [&str; 2] = [
    "https://iot.zinguo.com/api/v1",
    "https://iot2.zinguo.com/api/v1",
];

#[derive(Debug, Default)]
struct SessionState {
    endpoint: Option<Url>,
    token: Option<SecretString>,
}

/// Token and endpoint lifecycle for one account.
///
/// One instance per device coordinator; shared by handle (`Arc`), never
/// global. All state sits behind an async mutex so a scheduled refresh and
/// a user command cannot race to clear and repopulate the token.
#[derive(Debug)]
pub struct SessionManager {
    client: ZinguoClient,
    credentials: Credentials,
    candidates: Vec<Url>,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(client: ZinguoClient, credentials: Credentials, candidates: Vec<Url>) -> Self {
        Self {
            client,
            credentials,
            candidates,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Session manager probing the vendor's [`DEFAULT_ENDPOINTS`].
    pub fn with_default_endpoints(
        client: ZinguoClient,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let candidates = DEFAULT_ENDPOINTS
            .iter()
            .map(|e| Url::parse(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(client, credentials, candidates))
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &ZinguoClient {
        &self.client
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The pinned endpoint, once a login has succeeded.
    pub async fn endpoint(&self) -> Option<Url> {
        self.state.lock().await.endpoint.clone()
    }

    pub async fn has_token(&self) -> bool {
        self.state.lock().await.token.is_some()
    }

    /// Log in and return the endpoint/token pair.
    ///
    /// Probes the candidates in order while nothing is pinned; once an
    /// endpoint is pinned this is a direct login against it.
    pub async fn resolve_endpoint_and_login(&self) -> Result<(Url, SecretString), Error> {
        let auth = self.login().await?;
        Ok((auth.endpoint, auth.token))
    }

    /// Force a fresh login, replacing any stored token.
    pub async fn login(&self) -> Result<Authenticated, Error> {
        let mut state = self.state.lock().await;
        self.login_locked(&mut state).await
    }

    /// Return the current token, logging in first if there is none.
    pub async fn ensure_token(&self) -> Result<Authenticated, Error> {
        let mut state = self.state.lock().await;
        if let (Some(endpoint), Some(token)) = (&state.endpoint, &state.token) {
            return Ok(Authenticated {
                endpoint: endpoint.clone(),
                token: token.clone(),
            });
        }
        debug!("no token, logging in");
        self.login_locked(&mut state).await
    }

    /// Drop the stored token. The pinned endpoint is kept.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.token.take().is_some() {
            debug!("session token invalidated");
        }
    }

    async fn login_locked(&self, state: &mut SessionState) -> Result<Authenticated, Error> {
        state.token = None;

        let Some(endpoint) = state.endpoint.clone() else {
            return self.probe_locked(state).await;
        };

        let token = self.client.login(&endpoint, &self.credentials).await?;
        state.token = Some(token.clone());
        Ok(Authenticated { endpoint, token })
    }

    async fn probe_locked(&self, state: &mut SessionState) -> Result<Authenticated, Error> {
        let mut rejected = false;

        for candidate in &self.candidates {
            debug!(endpoint = %candidate, "probing endpoint");
            match self.client.login(candidate, &self.credentials).await {
                Ok(token) => {
                    info!(endpoint = %candidate, "found working endpoint");
                    state.endpoint = Some(candidate.clone());
                    state.token = Some(token.clone());
                    return Ok(Authenticated {
                        endpoint: candidate.clone(),
                        token,
                    });
                }
                Err(e) => {
                    rejected |= e.is_invalid_credentials();
                    debug!(endpoint = %candidate, error = %e, "endpoint probe failed");
                }
            }
        }

        if rejected {
            warn!(account = self.credentials.account(), "credentials rejected");
            return Err(Error::InvalidCredentials {
                account: self.credentials.account().to_owned(),
            });
        }

        warn!(tried = self.candidates.len(), "no working API endpoint found");
        Err(Error::NoWorkingEndpoint {
            tried: self.candidates.len(),
        })
    }
}
