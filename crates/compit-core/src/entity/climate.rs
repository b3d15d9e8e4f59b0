// Composite thermostat over the well-known room controller codes.

use compit_api::Parameter;
use strum::{Display, EnumIter, EnumString};

use super::{Entity, EntityBase};
use crate::classify::Platform;
use crate::coordinator::Coordinator;
use crate::error::CoreError;
use crate::model::DeviceInstance;

pub const CURRENT_TEMPERATURE: &str = "__tpokojowa";
pub const TARGET_TEMPERATURE: &str = "__tpokzadana";
pub const MANUAL_TARGET_TEMPERATURE: &str = "__tempzadpracareczna";
pub const PRESET_MODE: &str = "__trybpracytermostatu";
pub const FAN_MODE: &str = "__trybaero";
pub const HVAC_MODE: &str = "__trybpracyinstalacji";

/// Preset state that makes the manual setpoint authoritative.
pub const MANUAL_PRESET_STATE: i64 = 2;

pub const TEMPERATURE_UNIT: &str = "°C";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HvacMode {
    Heat,
    Cool,
    Off,
}

impl HvacMode {
    /// Installation mode value as reported by the controller.
    pub fn from_state(state: i64) -> Option<Self> {
        match state {
            0 => Some(Self::Heat),
            1 => Some(Self::Off),
            2 => Some(Self::Cool),
            _ => None,
        }
    }

    pub fn state(self) -> i64 {
        match self {
            Self::Heat => 0,
            Self::Off => 1,
            Self::Cool => 2,
        }
    }
}

/// Thermostat view of a class 10 controller.
#[derive(Clone)]
pub struct ClimateEntity {
    base: EntityBase,
    presets: Option<Parameter>,
    fan_modes: Option<Parameter>,
}

impl ClimateEntity {
    pub(crate) fn new(coordinator: &Coordinator, instance: &DeviceInstance) -> Self {
        Self {
            base: EntityBase::new(coordinator, instance, "climate", "climate"),
            presets: instance.definition.parameter(PRESET_MODE).cloned(),
            fan_modes: instance.definition.parameter(FAN_MODE).cloned(),
        }
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.base.param(CURRENT_TEMPERATURE)?.as_f64()
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.base.param(TARGET_TEMPERATURE)?.as_f64()
    }

    pub fn temperature_unit(&self) -> &'static str {
        TEMPERATURE_UNIT
    }

    pub fn hvac_modes(&self) -> [HvacMode; 3] {
        [HvacMode::Heat, HvacMode::Cool, HvacMode::Off]
    }

    pub fn hvac_mode(&self) -> Option<HvacMode> {
        HvacMode::from_state(self.base.param(HVAC_MODE)?.as_i64()?)
    }

    pub fn preset_modes(&self) -> Option<Vec<String>> {
        self.presets.as_ref().map(descriptions)
    }

    pub fn preset_mode(&self) -> Option<String> {
        self.current_description(self.presets.as_ref()?)
    }

    pub fn fan_modes(&self) -> Option<Vec<String>> {
        self.fan_modes.as_ref().map(descriptions)
    }

    pub fn fan_mode(&self) -> Option<String> {
        self.current_description(self.fan_modes.as_ref()?)
    }

    /// Switch to the manual preset, then write the manual setpoint.
    pub async fn set_temperature(&self, temperature: f64) -> Result<(), CoreError> {
        self.base.write(PRESET_MODE, MANUAL_PRESET_STATE).await?;
        self.base
            .write(MANUAL_TARGET_TEMPERATURE, temperature)
            .await
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<(), CoreError> {
        self.base.write(HVAC_MODE, mode.state()).await
    }

    pub async fn set_preset_mode(&self, preset: &str) -> Result<(), CoreError> {
        let state = detail_state(self.presets.as_ref(), PRESET_MODE, preset)?;
        self.base.write(PRESET_MODE, state).await
    }

    pub async fn set_fan_mode(&self, fan_mode: &str) -> Result<(), CoreError> {
        let state = detail_state(self.fan_modes.as_ref(), FAN_MODE, fan_mode)?;
        self.base.write(FAN_MODE, state).await
    }

    fn current_description(&self, parameter: &Parameter) -> Option<String> {
        let state = self.base.param(&parameter.parameter_code)?.as_i64()?;
        parameter
            .detail_by_state(state)
            .map(|d| d.description.clone())
    }
}

impl Entity for ClimateEntity {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn platform(&self) -> Platform {
        Platform::Climate
    }

    fn display_value(&self) -> Option<String> {
        let mode = self.hvac_mode()?;
        Some(match (self.current_temperature(), self.target_temperature()) {
            (Some(current), Some(target)) => {
                format!("{mode} {current}{TEMPERATURE_UNIT} → {target}{TEMPERATURE_UNIT}")
            }
            _ => mode.to_string(),
        })
    }
}

fn descriptions(parameter: &Parameter) -> Vec<String> {
    parameter
        .details()
        .iter()
        .map(|d| d.description.clone())
        .collect()
}

fn detail_state(
    parameter: Option<&Parameter>,
    code: &str,
    description: &str,
) -> Result<i64, CoreError> {
    parameter
        .and_then(|p| p.detail_by_description(description))
        .map(|d| d.state)
        .ok_or_else(|| CoreError::Validation {
            message: format!("unknown mode {description:?} for {code}"),
        })
}
