//! CLI-side configuration: profile selection and flag overrides on top of
//! `compit_config`.

use std::time::Duration;

use secrecy::SecretString;

use compit_config::{Config, PASSWORD_ENV};
use compit_core::CoordinatorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use compit_config::{config_path, load_config_or_default, save_config};

/// Profile name from `--profile`, else the config's default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `CoordinatorConfig` from the config file, profile, and CLI flags.
pub fn build_coordinator_config(global: &GlobalOpts) -> Result<CoordinatorConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut config = if let Some(profile) = cfg.profiles.get(&profile_name) {
        compit_config::profile_to_coordinator_config(profile, &profile_name, &cfg.defaults)?
    } else if global.profile.is_some() {
        // Explicitly requested but missing.
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    } else {
        // No profile: e-mail from the flag, password from the environment.
        let email = global.email.clone().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;
        let password = std::env::var(PASSWORD_ENV)
            .map(SecretString::from)
            .map_err(|_| CliError::NoCredentials {
                profile: profile_name.clone(),
            })?;
        let mut config = CoordinatorConfig::new(email, password);
        config.language.clone_from(&cfg.defaults.language);
        config.timeout = Duration::from_secs(cfg.defaults.timeout);
        config.scan_interval = Duration::from_secs(cfg.defaults.scan_interval);
        config
    };

    apply_overrides(&mut config, global)?;
    Ok(config)
}

fn apply_overrides(config: &mut CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(ref email) = global.email {
        config.email.clone_from(email);
    }
    if let Some(mode) = global.mode {
        config.set_deployment(mode.into());
    }
    if let Some(ref language) = global.language {
        config.language.clone_from(language);
    }
    if let Some(ref url) = global.api_url {
        config.api_url = parse_url("api-url", url)?;
    }
    if let Some(ref url) = global.ws_url {
        config.ws_url = parse_url("ws-url", url)?;
    }
    if let Some(timeout) = global.timeout {
        config.timeout = Duration::from_secs(timeout);
    }
    Ok(())
}

fn parse_url(field: &str, value: &str) -> Result<url::Url, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {value}"),
    })
}
