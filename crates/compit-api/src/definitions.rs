// Device definition catalog DTOs.
//
// The catalog is a JSON array in the vendor's PascalCase layout, shipped
// per language (`devices_en.json`, `devices_pl.json`) and also served by
// `GET /device_definitions` on the push deployment.

use serde::{Deserialize, Serialize};

/// Static description of one device model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceDefinition {
    pub name: String,
    /// Device type code; joins with `Device::device_type`.
    pub code: u32,
    pub class: u32,
    #[serde(rename = "ID", default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl DeviceDefinition {
    pub fn parameter(&self, code: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.parameter_code == code)
    }
}

/// Static description of one parameter of a device model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub parameter_code: String,
    pub label: String,
    #[serde(default)]
    pub read_write: ReadWrite,
    #[serde(default)]
    pub details: Option<Vec<ParameterDetail>>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

impl Parameter {
    pub fn is_read_only(&self) -> bool {
        self.read_write == ReadWrite::ReadOnly
    }

    /// Enumerated states, empty when the parameter has none.
    pub fn details(&self) -> &[ParameterDetail] {
        self.details.as_deref().unwrap_or_default()
    }

    pub fn detail_by_state(&self, state: i64) -> Option<&ParameterDetail> {
        self.details().iter().find(|d| d.state == state)
    }

    pub fn detail_by_description(&self, description: &str) -> Option<&ParameterDetail> {
        self.details().iter().find(|d| d.description == description)
    }
}

/// Access token from the catalog. Anything other than `R` is writable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadWrite {
    #[default]
    #[serde(rename = "R")]
    ReadOnly,
    #[serde(rename = "RW")]
    ReadWrite,
    #[serde(other)]
    Other,
}

/// One enumerated state of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterDetail {
    pub state: i64,
    pub description: String,
    #[serde(default)]
    pub param: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_catalog_entry() {
        let def: DeviceDefinition = serde_json::from_value(json!({
            "Name": "Nano Color 2",
            "Code": 5,
            "Class": 10,
            "ID": 223,
            "Parameters": [
                {
                    "ParameterCode": "__tpokzadana",
                    "Label": "Target temperature",
                    "ReadWrite": "RW",
                    "MinValue": 10,
                    "MaxValue": 30,
                    "Unit": "°C"
                },
                {
                    "ParameterCode": "__tpokojowa",
                    "Label": "Room temperature"
                },
                {
                    "ParameterCode": "__trybaero",
                    "Label": "Ventilation",
                    "ReadWrite": "W",
                    "Details": [
                        { "State": 0, "Description": "Off", "Param": "__off" },
                        { "State": 1, "Description": "Low", "Param": "__low" }
                    ]
                }
            ]
        }))
        .unwrap();

        assert_eq!(def.id, Some(223));
        let target = def.parameter("__tpokzadana").unwrap();
        assert_eq!(target.read_write, ReadWrite::ReadWrite);
        assert_eq!(target.min_value, Some(10.0));

        let room = def.parameter("__tpokojowa").unwrap();
        assert!(room.is_read_only());
        assert!(room.details().is_empty());

        let aero = def.parameter("__trybaero").unwrap();
        assert_eq!(aero.read_write, ReadWrite::Other);
        assert!(!aero.is_read_only());
        assert_eq!(aero.detail_by_state(1).unwrap().description, "Low");
        assert_eq!(aero.detail_by_description("Off").unwrap().param, "__off");
    }
}
