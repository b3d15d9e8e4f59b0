// ── Domain model ──
//
// A `DeviceInstance` joins the three things the coordinator knows about a
// controller: where it sits (gate), what it is (shared definition) and
// what it currently reports (state).

use std::sync::Arc;

use compit_api::{Device, DeviceDefinition, DeviceState, Param, Parameter};
use serde::Serialize;

/// Live view of one device, owned by the coordinator's store.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInstance {
    pub gate_id: u64,
    pub device: Device,
    #[serde(skip)]
    pub definition: Arc<DeviceDefinition>,
    pub state: DeviceState,
}

impl DeviceInstance {
    pub fn new(
        gate_id: u64,
        device: Device,
        definition: Arc<DeviceDefinition>,
        state: DeviceState,
    ) -> Self {
        Self {
            gate_id,
            device,
            definition,
            state,
        }
    }

    pub fn id(&self) -> u64 {
        self.device.id
    }

    pub fn label(&self) -> &str {
        &self.device.label
    }

    pub fn param(&self, code: &str) -> Option<&Param> {
        self.state.param(code)
    }

    /// Definition parameters paired with their live record, in definition order.
    pub fn parameters(&self) -> impl Iterator<Item = (&Parameter, Option<&Param>)> {
        self.definition
            .parameters
            .iter()
            .map(|p| (p, self.state.param(&p.parameter_code)))
    }
}
