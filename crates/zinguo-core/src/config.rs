// ── Runtime coordinator configuration ──
//
// Describes *which* device to follow and *how* to reach the cloud. Carries
// credentials and timing, never touches disk: the CLI builds a
// `CoordinatorConfig` from a profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// How often the device is polled unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Pause between an acknowledged control write and the confirming refresh.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Default, the vendor hosts serve lapsed certificates.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for following a single bath heater.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Cloud account (usually a phone number).
    pub account: String,
    pub password: SecretString,
    /// MAC address of the device, as the cloud reports it.
    pub mac: String,
    /// Display name; falls back to the cloud-side name.
    pub name: Option<String>,
    /// Candidate base endpoints in probe order. Empty means the vendor defaults.
    pub endpoints: Vec<Url>,
    pub tls: TlsVerification,
    /// Bound on each logical network operation.
    pub timeout: Duration,
    /// Periodic refresh interval. Zero disables the background task.
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl CoordinatorConfig {
    pub fn new(account: impl Into<String>, password: SecretString, mac: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password,
            mac: mac.into(),
            name: None,
            endpoints: Vec::new(),
            tls: TlsVerification::default(),
            timeout: zinguo_api::transport::DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}
