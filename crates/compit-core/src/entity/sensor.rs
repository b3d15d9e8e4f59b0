use serde_json::Value;

use super::{Entity, EntityBase, ParameterBinding, value_text};
use crate::classify::Platform;

/// Values whose text form is longer than this go to the `raw` attribute.
pub const MAX_STATE_LEN: usize = 20;
/// Values longer than this are dropped entirely.
pub const MAX_ATTRIBUTE_LEN: usize = 1000;

/// Read-only parameter.
#[derive(Clone)]
pub struct SensorEntity {
    binding: ParameterBinding,
}

impl SensorEntity {
    pub(crate) fn new(binding: ParameterBinding) -> Self {
        Self { binding }
    }

    pub fn code(&self) -> &str {
        self.binding.code()
    }

    pub fn unit(&self) -> Option<&str> {
        self.binding.parameter().unit.as_deref()
    }

    /// The live value, unless its text form is too long to be a state.
    pub fn native_value(&self) -> Option<Value> {
        let value = self.binding.live()?.value;
        (text_len(&value) <= MAX_STATE_LEN).then_some(value)
    }

    /// `{"raw": value}` for values too long for [`native_value`](Self::native_value)
    /// but within the attribute limit.
    pub fn extra_state_attributes(&self) -> Option<Value> {
        let value = self.binding.live()?.value;
        let len = text_len(&value);
        (len > MAX_STATE_LEN && len <= MAX_ATTRIBUTE_LEN)
            .then(|| serde_json::json!({ "raw": value }))
    }
}

impl Entity for SensorEntity {
    fn base(&self) -> &EntityBase {
        &self.binding.base
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn display_value(&self) -> Option<String> {
        let text = value_text(&self.native_value()?)?;
        Some(match self.unit() {
            Some(unit) if !unit.is_empty() => format!("{text} {unit}"),
            _ => text,
        })
    }
}

fn text_len(value: &Value) -> usize {
    value_text(value).map_or(0, |s| s.chars().count())
}
