// Wire types for the iNext REST API and the push channel payloads.
//
// Field names follow the vendor JSON. Lenient where the API is known to
// omit fields (`version`, `errors`, `ext_info`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Topology ─────────────────────────────────────────────────────────

/// Gates visible to the authenticated account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub gates: Vec<Gate>,
}

impl SystemInfo {
    /// Iterate `(gate_id, device)` pairs in topology order.
    pub fn devices(&self) -> impl Iterator<Item = (u64, &Device)> {
        self.gates
            .iter()
            .flat_map(|gate| gate.devices.iter().map(move |d| (gate.id, d)))
    }
}

/// A site/installation with its attached controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: u64,
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// Topology record of a single controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: u64,
    #[serde(rename = "class")]
    pub class: u32,
    #[serde(rename = "type")]
    pub device_type: u32,
    #[serde(default = "default_version")]
    pub version: u32,
    pub label: String,
}

fn default_version() -> u32 {
    1
}

// ── Device state ─────────────────────────────────────────────────────

/// Full parameter state of one device, as returned by `GET /devices/{id}/state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub errors: Vec<Value>,
    #[serde(default)]
    pub last_connected_at: Option<String>,
    #[serde(default)]
    pub params: Vec<Param>,
}

impl DeviceState {
    /// Look up a live parameter by code.
    pub fn param(&self, code: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.code == code)
    }
}

/// Live value record of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub code: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub value_code: Option<String>,
    #[serde(default)]
    pub value_label: Option<String>,
    #[serde(default)]
    pub write: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_info: Option<Value>,
}

impl Param {
    /// Numeric view of the value. Numeric strings are accepted too.
    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view of the value, used to match enumerated detail states.
    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

// ── Push deltas ──────────────────────────────────────────────────────

/// Partial device state carried by push messages.
///
/// Every field is optional: a present field overwrites the stored one,
/// an absent (or `null`) field leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(default)]
    pub errors: Option<Vec<Value>>,
    #[serde(default)]
    pub last_connected_at: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDelta>,
}

/// Partial update of a single parameter, keyed by `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDelta {
    pub code: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub value_code: Option<String>,
    #[serde(default)]
    pub value_label: Option<String>,
    #[serde(default)]
    pub write: Option<bool>,
    #[serde(default)]
    pub ext_info: Option<Value>,
}

// ── Request / response bodies ────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct AuthorizeRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub uid: &'a str,
    pub label: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorizeResponse {
    pub token: String,
    #[serde(default)]
    pub gates: Vec<Gate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterClientRequest<'a> {
    pub fcm_token: Option<&'a str>,
    pub uid: &'a str,
    pub label: &'a str,
}

/// Body of `PUT /devices/{id}/params`. The API takes a list even for one value.
#[derive(Debug, Serialize)]
pub(crate) struct ParamsUpdate<'a> {
    pub values: Vec<ParamValue<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ParamValue<'a> {
    pub code: &'a str,
    pub value: &'a Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn gates_parse_with_missing_version() {
        let info: SystemInfo = serde_json::from_value(json!({
            "gates": [{
                "id": 1,
                "code": "G-0001",
                "label": "Home",
                "devices": [
                    { "id": 42, "class": 10, "type": 5, "label": "Living room" }
                ]
            }]
        }))
        .unwrap();

        let device = &info.gates[0].devices[0];
        assert_eq!(device.version, 1);
        assert_eq!(device.device_type, 5);
        assert_eq!(info.devices().count(), 1);
    }

    #[test]
    fn state_lookup_by_code() {
        let state: DeviceState = serde_json::from_value(json!({
            "errors": [],
            "last_connected_at": "2026-10-01T10:00:00Z",
            "params": [
                { "code": "__tpokzadana", "value": 21, "hidden": false, "write": true },
                { "code": "__tpokojowa", "value": "20.5", "hidden": false, "write": false }
            ]
        }))
        .unwrap();

        assert_eq!(state.param("__tpokzadana").unwrap().as_f64(), Some(21.0));
        assert_eq!(state.param("__tpokojowa").unwrap().as_f64(), Some(20.5));
        assert!(state.param("__missing").is_none());
    }

    #[test]
    fn integer_view_accepts_whole_floats() {
        let param: Param =
            serde_json::from_value(json!({ "code": "__trybaero", "value": 2.0 })).unwrap();
        assert_eq!(param.as_i64(), Some(2));

        let fractional: Param =
            serde_json::from_value(json!({ "code": "__x", "value": 2.5 })).unwrap();
        assert_eq!(fractional.as_i64(), None);
    }

    #[test]
    fn delta_null_fields_are_absent() {
        let delta: StateDelta = serde_json::from_value(json!({
            "params": [{ "code": "__tpokzadana", "value": 22, "min": null }]
        }))
        .unwrap();

        let p = &delta.params[0];
        assert_eq!(p.value, Some(json!(22)));
        assert_eq!(p.min, None);
        assert_eq!(p.hidden, None);
        assert!(delta.last_connected_at.is_none());
    }

    #[test]
    fn params_update_shape() {
        let value = json!(22);
        let body = ParamsUpdate {
            values: vec![ParamValue {
                code: "__tpokzadana",
                value: &value,
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "values": [{ "code": "__tpokzadana", "value": 22 }] })
        );
    }
}
