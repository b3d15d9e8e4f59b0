// compit-core: State coordinator and entity adapters between compit-api and host consumers.

pub mod classify;
pub mod config;
pub mod coordinator;
pub mod definitions;
pub mod entity;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use classify::{Platform, classify};
pub use config::{CatalogSource, CoordinatorConfig, SyncMode};
pub use coordinator::{Coordinator, SyncStatus};
pub use definitions::DefinitionIndex;
pub use entity::{
    ClimateEntity, DeviceInfo, Entities, Entity, HvacMode, NumberEntity, SelectEntity,
    SensorEntity, SwitchEntity,
};
pub use error::CoreError;
pub use model::DeviceInstance;
pub use store::{DeviceStore, Snapshot};
pub use stream::DeviceStream;

// Wire types consumers commonly need alongside the coordinator.
pub use compit_api::{AuthScheme, Device, DeviceDefinition, DeviceState, Gate, Param, Parameter, SystemInfo};
