//! Config subcommand handlers. None of these touch the network.

use compit_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigInitArgs, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "****";

/// Copy of `cfg` with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: compit_config::Defaults {
            language: cfg.defaults.language.clone(),
            timeout: cfg.defaults.timeout,
            scan_interval: cfg.defaults.scan_interval,
        },
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, p)| {
                let profile = Profile {
                    email: p.email.clone(),
                    password: p.password.as_ref().map(|_| MASK.to_owned()),
                    password_env: p.password_env.clone(),
                    mode: p.mode,
                    language: p.language.clone(),
                    api_url: p.api_url.clone(),
                    ws_url: p.ws_url.clone(),
                    catalog: p.catalog,
                    definitions_dir: p.definitions_dir.clone(),
                    scan_interval: p.scan_interval,
                    timeout: p.timeout,
                };
                (name.clone(), profile)
            })
            .collect(),
    }
}

fn init(args: &ConfigInitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let email = global.email.clone().ok_or_else(|| CliError::Validation {
        field: "email".into(),
        reason: "pass the account e-mail with --email".into(),
    })?;

    let mut cfg = config::load_config_or_default();
    let profile = cfg.profiles.entry(args.name.clone()).or_default();
    profile.email = email;
    if let Some(ref env) = args.password_env {
        profile.password_env = Some(env.clone());
    }
    if let Some(mode) = global.mode {
        profile.mode = mode.into();
    }
    if let Some(ref language) = global.language {
        profile.language = Some(language.clone());
    }
    if args.set_default || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(args.name.clone());
    }

    config::save_config(&cfg)?;
    output::print_output(
        &format!(
            "profile '{}' written to {}",
            args.name,
            config::config_path().display()
        ),
        global.quiet,
    );
    Ok(())
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match &args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let rendered = toml::to_string_pretty(&redacted(&cfg))?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
        ConfigCommand::Init(init_args) => init(init_args, global),
    }
}
