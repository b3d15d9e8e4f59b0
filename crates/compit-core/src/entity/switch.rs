use compit_api::ParameterDetail;
use serde_json::Value;

use super::{Entity, EntityBase, ParameterBinding, device_attributes};
use crate::classify::Platform;
use crate::error::CoreError;

/// Writable two-state parameter: the first detail is off, the second on.
#[derive(Clone)]
pub struct SwitchEntity {
    binding: ParameterBinding,
}

impl SwitchEntity {
    pub(crate) fn new(binding: ParameterBinding) -> Self {
        Self { binding }
    }

    pub fn code(&self) -> &str {
        self.binding.code()
    }

    /// `None` when the live value matches neither detail.
    pub fn is_on(&self) -> Option<bool> {
        let live = self.binding.live()?;
        let [off, on] = self.binding.parameter().details() else {
            return None;
        };

        let matches = |detail: &ParameterDetail| {
            live.as_i64() == Some(detail.state)
                || live.value_code.as_deref() == Some(detail.param.as_str())
        };
        if matches(on) {
            Some(true)
        } else if matches(off) {
            Some(false)
        } else {
            None
        }
    }

    pub async fn turn_on(&self) -> Result<(), CoreError> {
        self.write_state(true).await
    }

    pub async fn turn_off(&self) -> Result<(), CoreError> {
        self.write_state(false).await
    }

    /// Unknown state counts as off.
    pub async fn toggle(&self) -> Result<(), CoreError> {
        self.write_state(!self.is_on().unwrap_or(false)).await
    }

    pub fn extra_state_attributes(&self) -> Option<Value> {
        device_attributes(&self.binding.base)
    }

    async fn write_state(&self, on: bool) -> Result<(), CoreError> {
        let details = self.binding.parameter().details();
        let detail = details.get(usize::from(on)).ok_or_else(|| CoreError::Validation {
            message: format!("{} does not define on/off states", self.code()),
        })?;
        self.binding.write(detail.state).await
    }
}

impl Entity for SwitchEntity {
    fn base(&self) -> &EntityBase {
        &self.binding.base
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn display_value(&self) -> Option<String> {
        self.is_on().map(|on| if on { "on" } else { "off" }.to_owned())
    }
}
