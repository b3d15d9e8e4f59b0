// Shared transport wrapper around reqwest::Client.
//
// Every vendor call goes through `Transport`: a fixed per-call timeout,
// optional `Authorization` header injection, and JSON bodies. Timeouts are
// surfaced as `Error::Timeout` so callers can tell them apart from other
// transport failures.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Fixed timeout applied to every vendor REST call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("compit-bridge/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: USER_AGENT.into(),
        }
    }
}

impl TransportConfig {
    /// Config with a non-default timeout (tests use short ones).
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(Error::Transport)
    }
}

/// Thin GET/POST/PUT helper used by the API client.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    timeout: Duration,
}

impl Transport {
    pub fn new(config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
            timeout: config.timeout,
        })
    }

    /// Wrap an existing client. The timeout is still enforced per request.
    pub fn with_client(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, url: Url, auth: Option<&str>) -> Result<reqwest::Response, Error> {
        debug!("GET {}", url);
        self.send(self.http.get(url), auth).await
    }

    pub async fn post(
        &self,
        url: Url,
        body: &impl Serialize,
        auth: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        debug!("POST {}", url);
        self.send(self.http.post(url).json(body), auth).await
    }

    pub async fn put(
        &self,
        url: Url,
        body: &impl Serialize,
        auth: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        debug!("PUT {}", url);
        self.send(self.http.put(url).json(body), auth).await
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        auth: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        let builder = match auth {
            Some(value) => builder.header(reqwest::header::AUTHORIZATION, value),
            None => builder,
        };

        builder
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            tracing::warn!(url = ?err.url().map(Url::as_str), "request timed out");
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            tracing::warn!(error = %err, "request failed");
            Error::Transport(err)
        }
    }
}
