// iNext REST client
//
// Authentication (with the pending-registration dance), topology, device
// state, parameter writes and the remote definition catalog. Every request
// goes through `Transport`, so the fixed timeout applies uniformly.

use std::sync::RwLock;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::definitions::DeviceDefinition;
use crate::error::Error;
use crate::models::{
    AuthorizeRequest, AuthorizeResponse, DeviceState, ParamValue, ParamsUpdate,
    RegisterClientRequest, SystemInfo,
};
use crate::transport::{Transport, TransportConfig};

/// Production REST endpoint.
pub const DEFAULT_API_URL: &str = "https://inext.compit.pl/mobile/v2/compit";

/// Client identity announced to the vendor on authorize and registration.
pub const CLIENT_UID: &str = "HomeAssistant";
pub const CLIENT_LABEL: &str = "HomeAssistant";

/// How the session token is placed in the `Authorization` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthScheme {
    /// The bare token (polling deployment).
    #[default]
    Raw,
    /// `Bearer {token}` (push deployment).
    Bearer,
}

impl AuthScheme {
    fn header_value(self, token: &str) -> String {
        match self {
            Self::Raw => token.to_owned(),
            Self::Bearer => format!("Bearer {token}"),
        }
    }
}

/// Async client for the Compit iNext cloud API.
///
/// The session token is held behind a lock so a single client can be
/// shared (`Arc<CompitClient>`) between the coordinator and its tasks.
pub struct CompitClient {
    transport: Transport,
    base_url: Url,
    auth_scheme: AuthScheme,
    token: RwLock<Option<SecretString>>,
}

impl CompitClient {
    pub fn new(base_url: Url, auth_scheme: AuthScheme, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_transport(
            Transport::new(config)?,
            base_url,
            auth_scheme,
        ))
    }

    /// Build a client around an existing transport (tests, shared pools).
    pub fn with_transport(transport: Transport, base_url: Url, auth_scheme: AuthScheme) -> Self {
        Self {
            transport,
            base_url,
            auth_scheme,
            token: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        self.auth_scheme
    }

    /// Current session token, if `authenticate` has succeeded.
    pub fn token(&self) -> Option<SecretString> {
        self.token.read().expect("token lock poisoned").clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Log in and return the account topology.
    ///
    /// HTTP 422 means this client id is not yet registered: the body still
    /// carries a token, which is used to `POST /clients` before authorizing
    /// again. Only one registration round is attempted.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SystemInfo, Error> {
        let body = AuthorizeRequest {
            email,
            password: password.expose_secret(),
            uid: CLIENT_UID,
            label: CLIENT_LABEL,
        };
        let mut registered = false;

        loop {
            let resp = self.transport.post(self.url("authorize")?, &body, None).await?;

            if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
                if registered {
                    warn!("authorize still pending after client registration");
                    return Err(Error::Authentication {
                        message: "client registration was not accepted".into(),
                    });
                }
                let pending: AuthorizeResponse = read_json(resp).await?;
                self.set_token(pending.token);
                info!("client not registered yet, registering");
                self.register_client().await?;
                registered = true;
                continue;
            }

            let auth: AuthorizeResponse = parse_json(resp).await?;
            self.set_token(auth.token);
            debug!(gates = auth.gates.len(), "authenticated");
            return Ok(SystemInfo { gates: auth.gates });
        }
    }

    async fn register_client(&self) -> Result<(), Error> {
        let body = RegisterClientRequest {
            fcm_token: None,
            uid: CLIENT_UID,
            label: CLIENT_LABEL,
        };
        let resp = self
            .transport
            .post(self.url("clients")?, &body, Some(&self.auth_header()?))
            .await?;
        let _: Value = parse_json(resp).await?;
        Ok(())
    }

    // ── Endpoints ────────────────────────────────────────────────────

    pub async fn gates(&self) -> Result<SystemInfo, Error> {
        let resp = self
            .transport
            .get(self.url("gates")?, Some(&self.auth_header()?))
            .await?;
        parse_json(resp).await
    }

    pub async fn get_state(&self, device_id: u64) -> Result<DeviceState, Error> {
        let url = self.url(&format!("devices/{device_id}/state"))?;
        let resp = self.transport.get(url, Some(&self.auth_header()?)).await?;
        parse_json(resp).await
    }

    /// Write one parameter value. The response body is returned as-is.
    pub async fn update_device_parameter(
        &self,
        device_id: u64,
        code: &str,
        value: impl Into<Value>,
    ) -> Result<Value, Error> {
        let value = value.into();
        info!(device_id, code, %value, "setting parameter");

        let body = ParamsUpdate {
            values: vec![ParamValue {
                code,
                value: &value,
            }],
        };
        let url = self.url(&format!("devices/{device_id}/params"))?;
        let resp = self
            .transport
            .put(url, &body, Some(&self.auth_header()?))
            .await?;
        parse_json(resp).await
    }

    /// Remote definition catalog (push deployment).
    pub async fn device_definitions(&self) -> Result<Vec<DeviceDefinition>, Error> {
        let resp = self
            .transport
            .get(self.url("device_definitions")?, Some(&self.auth_header()?))
            .await?;
        parse_json(resp).await
    }

    // ── Internals ────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        let full = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&full)?)
    }

    fn set_token(&self, token: String) {
        *self.token.write().expect("token lock poisoned") = Some(SecretString::from(token));
    }

    fn auth_header(&self) -> Result<String, Error> {
        let guard = self.token.read().expect("token lock poisoned");
        let token = guard.as_ref().ok_or(Error::NotAuthenticated)?;
        Ok(self.auth_scheme.header_value(token.expose_secret()))
    }
}

/// Map the status, then decode the body.
async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("server rejected credentials (HTTP {})", status.as_u16()),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }

    read_json(resp).await
}

/// Decode the body regardless of status.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await.map_err(Error::Transport)?;
    // Empty success bodies decode as `null`.
    let text = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> CompitClient {
        CompitClient::new(
            Url::parse(base).unwrap(),
            AuthScheme::Raw,
            &TransportConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn header_value_per_scheme() {
        assert_eq!(AuthScheme::Raw.header_value("abc"), "abc");
        assert_eq!(AuthScheme::Bearer.header_value("abc"), "Bearer abc");
    }

    #[test]
    fn calls_before_authenticate_fail() {
        let client = client(DEFAULT_API_URL);
        assert!(!client.is_authenticated());
        assert!(matches!(client.auth_header(), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = client("http://localhost:9999/api/");
        let url = client.url("devices/42/state").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9999/api/devices/42/state");
    }
}
