//! Profile configuration for the Zinguo tools.
//!
//! TOML profiles, password resolution (env + keyring + plaintext), and
//! translation to `zinguo_core::CoordinatorConfig`. Files are only read:
//! profiles are written by hand. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use zinguo_core::{CoordinatorConfig, TlsVerification};

/// Keyring service name; entries are `<profile>/password`.
pub const KEYRING_SERVICE: &str = "zinguo";

/// Env var consulted when a profile names no `password_env` of its own.
pub const PASSWORD_ENV: &str = "ZINGUO_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound {
        name: String,
        /// Configured profile names, sorted.
        available: Vec<String>,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is selected.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile`, then "default".
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
            .to_owned();
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::ProfileNotFound {
                name,
                available: self.profile_names(),
            }),
        }
    }

    /// Configured profile names, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    30
}

/// One bath heater and the account that owns it.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Cloud account, usually a phone number.
    pub account: Option<String>,

    /// Device MAC. Optional so that `devices` can run before it is known.
    pub mac: Option<String>,

    /// Display name override.
    pub name: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Base endpoint overrides, in probe order.
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Override the polling interval.
    pub poll_interval_secs: Option<u64>,

    /// Pause before the confirming refresh after a write.
    pub settle_delay_ms: Option<u64>,

    /// Override the timeout.
    pub timeout: Option<u64>,

    /// Skip certificate verification. Unset means lenient, the vendor hosts
    /// serve lapsed certificates.
    pub insecure: Option<bool>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "zinguo", "zinguo").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("zinguo");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full config from the canonical file and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` merged with `ZINGUO_`-prefixed env vars.
///
/// Nested keys use a double underscore: `ZINGUO_PROFILES__HOME__MAC`.
/// A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ZINGUO_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Password resolution ─────────────────────────────────────────────

/// Resolve the profile's password from the process environment, the system
/// keyring, and finally the profile itself.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        keyring_password,
    )
}

/// Password chain with injectable lookups:
///
/// 1. the variable named by `password_env`
/// 2. `ZINGUO_PASSWORD`
/// 3. the keyring entry `zinguo` / `<profile>/password`
/// 4. plaintext `password`
pub fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    if let Some(value) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(value));
    }

    if let Some(value) = env(PASSWORD_ENV) {
        return Ok(SecretString::from(value));
    }

    if let Some(value) = keyring(profile_name) {
        return Ok(SecretString::from(value));
    }

    if let Some(ref value) = profile.password {
        return Ok(SecretString::from(value.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .ok()?
        .get_password()
        .ok()
}

// ── Profile → CoordinatorConfig ─────────────────────────────────────

/// TLS mode for a profile. An explicit `insecure = false` without a CA file
/// means the system store.
pub fn profile_tls(profile: &Profile) -> TlsVerification {
    match (profile.insecure, &profile.ca_cert) {
        (Some(true), _) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca_path)) => TlsVerification::CustomCa(ca_path.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
        (None, None) => TlsVerification::DangerAcceptInvalid,
    }
}

/// Parse the profile's endpoint overrides.
pub fn profile_endpoints(profile: &Profile) -> Result<Vec<Url>, ConfigError> {
    profile
        .endpoints
        .iter()
        .map(|raw| {
            raw.parse::<Url>().map_err(|e| ConfigError::Validation {
                field: "endpoints".into(),
                reason: format!("invalid URL '{raw}': {e}"),
            })
        })
        .collect()
}

/// Build a `CoordinatorConfig` from a profile, no CLI overrides.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let account = profile
        .account
        .clone()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ConfigError::Validation {
            field: "account".into(),
            reason: format!("profile '{profile_name}' has no account"),
        })?;
    let password = resolve_password(profile, profile_name)?;

    build_coordinator_config(profile, defaults, account, password)
}

/// Assemble the runtime config once account and password are known.
pub fn build_coordinator_config(
    profile: &Profile,
    defaults: &Defaults,
    account: String,
    password: SecretString,
) -> Result<CoordinatorConfig, ConfigError> {
    let mut config = CoordinatorConfig::new(
        account,
        password,
        profile.mac.clone().unwrap_or_default(),
    );
    config.name.clone_from(&profile.name);
    config.endpoints = profile_endpoints(profile)?;
    config.tls = profile_tls(profile);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.poll_interval = Duration::from_secs(
        profile
            .poll_interval_secs
            .unwrap_or(defaults.poll_interval_secs),
    );
    if let Some(ms) = profile.settle_delay_ms {
        config.settle_delay = Duration::from_millis(ms);
    }
    Ok(config)
}
