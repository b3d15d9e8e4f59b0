//! `compit gates`: topology with the model each device resolved to.

use serde::Serialize;
use tabled::Tabled;

use compit_core::Coordinator;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DeviceEntry {
    gate_id: u64,
    gate_code: String,
    gate_label: String,
    device_id: u64,
    label: String,
    class: u32,
    device_type: u32,
    model: Option<String>,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Gate")]
    gate: String,
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Class")]
    class: u32,
    #[tabled(rename = "Type")]
    device_type: u32,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Available")]
    available: bool,
    #[tabled(rename = "Last error")]
    error: String,
}

fn to_row(entry: &DeviceEntry) -> DeviceRow {
    DeviceRow {
        gate: format!("{} ({})", entry.gate_label, entry.gate_code),
        id: entry.device_id,
        label: entry.label.clone(),
        class: entry.class,
        device_type: entry.device_type,
        model: output::or_dash(entry.model.clone()),
        available: entry.available,
        error: output::or_dash(entry.error.clone()),
    }
}

pub fn handle(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let gates = coordinator.gates();
    let entries: Vec<DeviceEntry> = gates
        .gates
        .iter()
        .flat_map(|gate| {
            gate.devices.iter().map(move |device| DeviceEntry {
                gate_id: gate.id,
                gate_code: gate.code.clone(),
                gate_label: gate.label.clone(),
                device_id: device.id,
                label: device.label.clone(),
                class: device.class,
                device_type: device.device_type,
                model: coordinator
                    .device(device.id)
                    .map(|d| d.definition.name.clone()),
                available: coordinator.is_available(device.id),
                error: coordinator.unavailable_reason(device.id),
            })
        })
        .collect();

    let out = output::render_list(global.output, &entries, to_row, |e| {
        e.device_id.to_string()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
