// ── Runtime coordinator configuration ──
//
// Describes *how* to reach the vendor cloud and how to keep state in
// sync. Carries credentials and timer tuning but never touches disk; the
// CLI (via compit-config) builds a `CoordinatorConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use compit_api::AuthScheme;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// How device state is kept current. Chosen once at setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyncMode {
    /// Periodic REST refresh of every device.
    #[default]
    Polling,
    /// REST bootstrap plus a WebSocket session for live deltas.
    Push,
}

impl SyncMode {
    /// Header scheme of the deployment that serves this strategy.
    pub fn auth_scheme(self) -> AuthScheme {
        match self {
            Self::Polling => AuthScheme::Raw,
            Self::Push => AuthScheme::Bearer,
        }
    }
}

/// Where the device definition catalog comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CatalogSource {
    /// Catalogs compiled into the binary.
    #[default]
    Bundled,
    /// `devices_{lang}.json` files in a directory.
    Directory(PathBuf),
    /// `GET /device_definitions` on the vendor API.
    Remote,
}

/// Configuration for one coordinator (one account).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub api_url: Url,
    pub ws_url: Url,
    pub email: String,
    pub password: SecretString,
    pub mode: SyncMode,
    /// How the session token is sent. Follows the deployment, so it is kept
    /// when `mode` alone is overridden.
    pub auth_scheme: AuthScheme,
    /// Catalog language; falls back to `en` when no localized file exists.
    pub language: String,
    pub catalog: CatalogSource,
    /// Per-request REST timeout.
    pub timeout: Duration,
    /// Poll period in polling mode.
    pub scan_interval: Duration,
    pub heartbeat_interval: Duration,
    pub resubscribe_interval: Duration,
    pub reconnect_delay: Duration,
}

impl CoordinatorConfig {
    /// Production endpoints and default timers for the given account.
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: default_ws_url(),
            email: email.into(),
            password,
            mode: SyncMode::default(),
            auth_scheme: SyncMode::default().auth_scheme(),
            language: DEFAULT_LANGUAGE.into(),
            catalog: CatalogSource::default(),
            timeout: compit_api::DEFAULT_TIMEOUT,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            heartbeat_interval: compit_api::websocket::DEFAULT_HEARTBEAT_INTERVAL,
            resubscribe_interval: compit_api::websocket::DEFAULT_RESUBSCRIBE_INTERVAL,
            reconnect_delay: compit_api::websocket::DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Target the deployment of `mode`: sets the strategy and its header
    /// scheme together.
    pub fn set_deployment(&mut self, mode: SyncMode) {
        self.mode = mode;
        self.auth_scheme = mode.auth_scheme();
    }
}

pub fn default_api_url() -> Url {
    Url::parse(compit_api::DEFAULT_API_URL).expect("default API URL is valid")
}

pub fn default_ws_url() -> Url {
    Url::parse(compit_api::DEFAULT_WS_URL).expect("default WebSocket URL is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_vendor_deployment() {
        let config = CoordinatorConfig::new("user@example.com", SecretString::from("x".to_owned()));
        assert_eq!(config.mode, SyncMode::Polling);
        assert_eq!(config.auth_scheme, AuthScheme::Raw);
        assert_eq!(config.scan_interval, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.language, "en");
        assert_eq!(config.api_url.host_str(), Some("inext.compit.pl"));
        assert_eq!(config.ws_url.scheme(), "wss");
    }

    #[test]
    fn forcing_polling_keeps_the_push_header_scheme() {
        let mut config = CoordinatorConfig::new("user@example.com", SecretString::from("x".to_owned()));
        config.set_deployment(SyncMode::Push);
        assert_eq!(config.auth_scheme, AuthScheme::Bearer);

        config.mode = SyncMode::Polling;
        assert_eq!(config.auth_scheme, AuthScheme::Bearer);
    }

    #[test]
    fn sync_mode_parses_case_insensitively() {
        assert_eq!("Push".parse::<SyncMode>().ok(), Some(SyncMode::Push));
        assert_eq!(SyncMode::Polling.to_string(), "polling");
    }
}
