// ── Core error types ──
//
// User-facing errors from zinguo-core. Consumers never match on HTTP
// plumbing directly: the `From<zinguo_api::Error>` impl folds transport
// failures into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Zinguo cloud at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("No reachable Zinguo endpoint (tried {tried})")]
    NoWorkingEndpoint { tried: usize },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Coordinator has been shut down")]
    ShutDown,

    // ── Authentication errors ────────────────────────────────────────
    /// Bad account/password. Retrying with the same credentials is pointless.
    #[error("Invalid credentials for account '{account}'")]
    InvalidCredentials { account: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The server kept rejecting fresh tokens for a control write.
    #[error("Session token rejected {attempts} times in a row")]
    TokenRejected { attempts: u32 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    /// The server answered with something that is not the expected JSON.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String, body: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the account/password pair itself was rejected.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::InvalidCredentials { .. })
    }

    /// Returns `true` for failures a later poll may not hit again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::NoWorkingEndpoint { .. } | Self::Timeout { .. } => {
                true
            }
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<zinguo_api::Error> for CoreError {
    fn from(err: zinguo_api::Error) -> Self {
        match err {
            zinguo_api::Error::InvalidCredentials { account } => {
                CoreError::InvalidCredentials { account }
            }
            zinguo_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            zinguo_api::Error::TokenExpired => CoreError::AuthenticationFailed {
                message: "Session token expired -- re-authentication required".into(),
            },
            zinguo_api::Error::NoWorkingEndpoint { tried } => {
                CoreError::NoWorkingEndpoint { tried }
            }
            zinguo_api::Error::Transport(ref e) => {
                if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            zinguo_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            zinguo_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            zinguo_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            zinguo_api::Error::Api { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            zinguo_api::Error::Deserialization { message, body } => {
                CoreError::MalformedResponse { message, body }
            }
        }
    }
}
