// ── Entity adapters ──
//
// Host-facing views over coordinator data. Each adapter is identified by
// device id plus parameter code and reads its value from the coordinator on
// every access; writes go through `Coordinator::set_parameter` and are only
// visible once the follow-up refresh lands.

mod climate;
mod number;
mod select;
mod sensor;
mod switch;

use compit_api::{Param, Parameter};
use serde::Serialize;
use serde_json::Value;

pub use climate::{ClimateEntity, HvacMode};
pub use number::NumberEntity;
pub use select::SelectEntity;
pub use sensor::SensorEntity;
pub use switch::SwitchEntity;

use crate::classify::{Platform, classify};
use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::model::DeviceInstance;

pub const MANUFACTURER: &str = "Compit";
pub const DEVICE_INFO_DOMAIN: &str = "compit";

/// Definition class of room controllers that get a climate entity.
pub const CLIMATE_CLASS: u32 = 10;

// ── Device info ──────────────────────────────────────────────────

/// Host device registry record shared by all entities of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceInfo {
    pub fn for_instance(instance: &DeviceInstance) -> Self {
        Self {
            identifiers: (DEVICE_INFO_DOMAIN.to_owned(), instance.id().to_string()),
            name: instance.label().to_owned(),
            manufacturer: MANUFACTURER.to_owned(),
            model: instance.definition.name.clone(),
        }
    }
}

// ── Entity trait ─────────────────────────────────────────────────

/// Common surface of every adapter.
pub trait Entity {
    fn base(&self) -> &EntityBase;

    fn platform(&self) -> Platform;

    /// Human-readable current value, `None` when unknown.
    fn display_value(&self) -> Option<String>;

    fn unique_id(&self) -> &str {
        &self.base().unique_id
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn device_id(&self) -> u64 {
        self.base().device_id
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.base().device_info
    }

    /// Device known to the coordinator and its last fetch succeeded.
    fn available(&self) -> bool {
        self.base().coordinator.is_available(self.base().device_id)
    }
}

/// Identity and coordinator access shared by the adapters.
#[derive(Clone)]
pub struct EntityBase {
    coordinator: Coordinator,
    device_id: u64,
    unique_id: String,
    name: String,
    device_info: DeviceInfo,
}

impl EntityBase {
    fn new(coordinator: &Coordinator, instance: &DeviceInstance, key: &str, label: &str) -> Self {
        Self {
            coordinator: coordinator.clone(),
            device_id: instance.id(),
            unique_id: format!("{}_{key}", instance.id()),
            name: format!("{} {label}", instance.label()),
            device_info: DeviceInfo::for_instance(instance),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Live record for `code` on this entity's device.
    pub fn param(&self, code: &str) -> Option<Param> {
        self.coordinator.param(self.device_id, code)
    }

    async fn write(&self, code: &str, value: impl Into<Value>) -> Result<(), CoreError> {
        self.coordinator
            .set_parameter(self.device_id, code, value)
            .await
    }
}

/// Adapter bound to one definition parameter.
#[derive(Clone)]
pub(crate) struct ParameterBinding {
    base: EntityBase,
    parameter: Parameter,
}

impl ParameterBinding {
    fn new(coordinator: &Coordinator, instance: &DeviceInstance, parameter: &Parameter) -> Self {
        Self {
            base: EntityBase::new(
                coordinator,
                instance,
                &parameter.parameter_code,
                &parameter.label,
            ),
            parameter: parameter.clone(),
        }
    }

    fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    fn code(&self) -> &str {
        &self.parameter().parameter_code
    }

    fn live(&self) -> Option<Param> {
        self.base.param(self.code())
    }

    async fn write(&self, value: impl Into<Value>) -> Result<(), CoreError> {
        self.base.write(self.code(), value).await
    }
}

// ── Discovery ────────────────────────────────────────────────────

/// All adapters for the devices currently in the coordinator store.
#[derive(Default, Clone)]
pub struct Entities {
    pub sensors: Vec<SensorEntity>,
    pub numbers: Vec<NumberEntity>,
    pub selects: Vec<SelectEntity>,
    pub switches: Vec<SwitchEntity>,
    pub climates: Vec<ClimateEntity>,
}

impl Entities {
    /// Classify every parameter of every device and build its adapter.
    pub fn discover(coordinator: &Coordinator) -> Self {
        let mut entities = Self::default();

        for instance in coordinator.snapshot().iter() {
            for (parameter, live) in instance.parameters() {
                let Some(platform) = classify(parameter, live) else {
                    continue;
                };
                let binding = ParameterBinding::new(coordinator, instance, parameter);
                match platform {
                    Platform::Sensor => entities.sensors.push(SensorEntity::new(binding)),
                    Platform::Number => entities.numbers.push(NumberEntity::new(binding)),
                    Platform::Select => entities.selects.push(SelectEntity::new(binding)),
                    Platform::Switch => entities.switches.push(SwitchEntity::new(binding)),
                    Platform::Climate => {}
                }
            }

            if instance.definition.class == CLIMATE_CLASS {
                entities
                    .climates
                    .push(ClimateEntity::new(coordinator, instance));
            }
        }

        entities
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Entity> {
        self.sensors
            .iter()
            .map(|e| e as &dyn Entity)
            .chain(self.numbers.iter().map(|e| e as &dyn Entity))
            .chain(self.selects.iter().map(|e| e as &dyn Entity))
            .chain(self.switches.iter().map(|e| e as &dyn Entity))
            .chain(self.climates.iter().map(|e| e as &dyn Entity))
    }

    pub fn find(&self, unique_id: &str) -> Option<&dyn Entity> {
        self.iter().find(|e| e.unique_id() == unique_id)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
            + self.numbers.len()
            + self.selects.len()
            + self.switches.len()
            + self.climates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Codes of every parameter of `instance` that is exposed on some platform.
/// This is the selected parameter group requested over the push channel.
pub fn exposed_codes(instance: &DeviceInstance) -> Vec<String> {
    instance
        .parameters()
        .filter(|(parameter, live)| classify(parameter, *live).is_some())
        .map(|(parameter, _)| parameter.parameter_code.clone())
        .collect()
}

/// Render a JSON scalar without quotes.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// `details` attribute block describing the owning device.
pub(crate) fn device_attributes(base: &EntityBase) -> Option<Value> {
    let instance = base.coordinator.device(base.device_id)?;
    Some(serde_json::json!({
        "details": [{
            "device": instance.label(),
            "device_id": instance.id(),
            "device_class": instance.device.class,
            "device_type": instance.device.device_type,
        }]
    }))
}
