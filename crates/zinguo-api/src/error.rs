use thiserror::Error;

/// Top-level error type for the `zinguo-api` crate.
///
/// Covers every failure mode of the vendor cloud: authentication, token
/// lifecycle, transport, and malformed responses. `zinguo-core` maps these
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The login endpoint rejected the account/password pair (HTTP 401).
    /// Never retried -- the caller has to supply new credentials.
    #[error("Invalid credentials for account '{account}'")]
    InvalidCredentials { account: String },

    /// Login failed for a reason other than bad credentials (non-200 status,
    /// missing token in the body, ...).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The server reported the session token as expired or invalid
    /// (HTTP 401 or an `invalid_token` marker in the body).
    #[error("Session token expired -- re-authentication required")]
    TokenExpired,

    /// Every candidate endpoint failed the login probe.
    #[error("No working API endpoint found (tried {tried})")]
    NoWorkingEndpoint { tried: usize },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A logical operation exceeded its time budget.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success status from an authenticated endpoint.
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the token has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Returns `true` if re-entering credentials is the only fix.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::InvalidCredentials { .. })
    }
}
