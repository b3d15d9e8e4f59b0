//! `compit entities`: every adapter the classifier produced.

use serde::Serialize;
use tabled::Tabled;

use compit_core::{Coordinator, Platform};

use crate::cli::{EntitiesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct EntityEntry {
    unique_id: String,
    platform: Platform,
    name: String,
    device_id: u64,
    value: Option<String>,
    available: bool,
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    unique_id: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Available")]
    available: bool,
}

fn to_row(entry: &EntityEntry) -> EntityRow {
    EntityRow {
        unique_id: entry.unique_id.clone(),
        platform: entry.platform.to_string(),
        name: entry.name.clone(),
        value: output::or_dash(entry.value.clone()),
        available: entry.available,
    }
}

pub fn handle(
    coordinator: &Coordinator,
    args: &EntitiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(device_id) = args.device {
        if coordinator.device(device_id).is_none() {
            return Err(compit_core::CoreError::DeviceNotFound { device_id }.into());
        }
    }
    let platform = args.platform.map(Platform::from);

    let entities = coordinator.entities();
    let entries: Vec<EntityEntry> = entities
        .iter()
        .filter(|e| args.device.is_none_or(|id| e.device_id() == id))
        .filter(|e| platform.is_none_or(|p| e.platform() == p))
        .map(|e| EntityEntry {
            unique_id: e.unique_id().to_owned(),
            platform: e.platform(),
            name: e.name().to_owned(),
            device_id: e.device_id(),
            value: e.display_value(),
            available: e.available(),
        })
        .collect();

    let out = output::render_list(global.output, &entries, to_row, |e| e.unique_id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
