//! CLI configuration: thin layer over `zinguo_config`.
//!
//! Picks the active profile and applies `GlobalOpts` flag overrides
//! (--account, --mac, --insecure, --timeout) on top of it.

use std::time::Duration;

use zinguo_config::{Config, ConfigError, Profile};
use zinguo_core::{CoordinatorConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the coordinator configuration for this invocation.
///
/// A profile that was asked for by name must exist. Without any profile the
/// flags and environment alone must supply the account and password.
pub fn resolve(global: &GlobalOpts) -> Result<(String, CoordinatorConfig), CliError> {
    let cfg = zinguo_config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let fallback = Profile::default();
    let profile = match cfg.profile(Some(&profile_name)) {
        Ok((_, profile)) => profile,
        Err(ConfigError::ProfileNotFound { .. }) if global.profile.is_none() => &fallback,
        Err(e) => return Err(e.into()),
    };

    let account = global
        .account
        .clone()
        .or_else(|| profile.account.clone())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.clone(),
            path: zinguo_config::config_path().display().to_string(),
        })?;
    let password = zinguo_config::resolve_password(profile, &profile_name)?;

    let mut config =
        zinguo_config::build_coordinator_config(profile, &cfg.defaults, account, password)?;
    apply_overrides(&mut config, global);

    Ok((profile_name, config))
}

fn apply_overrides(config: &mut CoordinatorConfig, global: &GlobalOpts) {
    if let Some(ref mac) = global.mac {
        config.mac.clone_from(mac);
    }
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
}
