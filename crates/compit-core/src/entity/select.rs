use compit_api::ParameterDetail;
use serde_json::Value;

use super::{Entity, EntityBase, ParameterBinding, device_attributes};
use crate::classify::Platform;
use crate::error::CoreError;

/// Writable parameter with an enumerated set of states.
#[derive(Clone)]
pub struct SelectEntity {
    binding: ParameterBinding,
}

impl SelectEntity {
    pub(crate) fn new(binding: ParameterBinding) -> Self {
        Self { binding }
    }

    pub fn code(&self) -> &str {
        self.binding.code()
    }

    /// Detail descriptions in definition order.
    pub fn options(&self) -> Vec<String> {
        self.binding
            .parameter()
            .details()
            .iter()
            .map(|d| d.description.clone())
            .collect()
    }

    /// Resolve the live value to an option: by detail state, then by the
    /// reported `value_code`, then the reported label as-is.
    pub fn current_option(&self) -> Option<String> {
        let live = self.binding.live()?;
        let parameter = self.binding.parameter();

        if let Some(detail) = live.as_i64().and_then(|v| parameter.detail_by_state(v)) {
            return Some(detail.description.clone());
        }
        if let Some(detail) = live
            .value_code
            .as_deref()
            .and_then(|code| parameter.details().iter().find(|d| d.param == code))
        {
            return Some(detail.description.clone());
        }
        live.value_label
    }

    pub async fn select_option(&self, option: &str) -> Result<(), CoreError> {
        let detail = self.detail(option)?;
        self.binding.write(detail.state).await
    }

    pub fn extra_state_attributes(&self) -> Option<Value> {
        device_attributes(&self.binding.base)
    }

    fn detail(&self, option: &str) -> Result<&ParameterDetail, CoreError> {
        self.binding
            .parameter()
            .detail_by_description(option)
            .ok_or_else(|| CoreError::Validation {
                message: format!(
                    "unknown option {option:?} for {}; expected one of {:?}",
                    self.code(),
                    self.options()
                ),
            })
    }
}

impl Entity for SelectEntity {
    fn base(&self) -> &EntityBase {
        &self.binding.base
    }

    fn platform(&self) -> Platform {
        Platform::Select
    }

    fn display_value(&self) -> Option<String> {
        self.current_option()
    }
}
