// compit-api: Async Rust client for the Compit iNext cloud API (REST + Phoenix push)

pub mod client;
pub mod definitions;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::{AuthScheme, CLIENT_LABEL, CLIENT_UID, CompitClient, DEFAULT_API_URL};
pub use definitions::{DeviceDefinition, Parameter, ParameterDetail, ReadWrite};
pub use error::Error;
pub use models::{Device, DeviceState, Gate, Param, ParamDelta, StateDelta, SystemInfo};
pub use transport::{DEFAULT_TIMEOUT, Transport, TransportConfig};
pub use websocket::{
    DEFAULT_WS_URL, PushConfig, PushEvent, PushHandle, PushState, StateUpdate, Subscription,
    UpdateKind,
};
