use super::{Entity, EntityBase, ParameterBinding};
use crate::classify::Platform;
use crate::error::CoreError;

pub const DEFAULT_MIN: f64 = 0.0;
pub const DEFAULT_MAX: f64 = 100.0;

/// Writable parameter with numeric bounds.
#[derive(Clone)]
pub struct NumberEntity {
    binding: ParameterBinding,
}

impl NumberEntity {
    pub(crate) fn new(binding: ParameterBinding) -> Self {
        Self { binding }
    }

    pub fn code(&self) -> &str {
        self.binding.code()
    }

    pub fn unit(&self) -> Option<&str> {
        self.binding.parameter().unit.as_deref()
    }

    pub fn native_value(&self) -> Option<f64> {
        self.binding.live()?.as_f64()
    }

    /// Live bound when the device reports one, else the definition's.
    pub fn min_value(&self) -> f64 {
        self.binding
            .live()
            .and_then(|p| p.min)
            .or(self.binding.parameter().min_value)
            .unwrap_or(DEFAULT_MIN)
    }

    pub fn max_value(&self) -> f64 {
        self.binding
            .live()
            .and_then(|p| p.max)
            .or(self.binding.parameter().max_value)
            .unwrap_or(DEFAULT_MAX)
    }

    pub async fn set_native_value(&self, value: f64) -> Result<(), CoreError> {
        let (min, max) = (self.min_value(), self.max_value());
        if !(min..=max).contains(&value) {
            return Err(CoreError::Validation {
                message: format!("{value} is outside {min}..={max} for {}", self.code()),
            });
        }
        self.binding.write(value).await
    }
}

impl Entity for NumberEntity {
    fn base(&self) -> &EntityBase {
        &self.binding.base
    }

    fn platform(&self) -> Platform {
        Platform::Number
    }

    fn display_value(&self) -> Option<String> {
        let value = self.native_value()?;
        Some(match self.unit() {
            Some(unit) if !unit.is_empty() => format!("{value} {unit}"),
            _ => value.to_string(),
        })
    }
}
