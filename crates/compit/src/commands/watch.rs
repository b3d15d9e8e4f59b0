//! `compit watch`: print parameter changes as they arrive.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use compit_core::{Coordinator, Snapshot, SyncStatus};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

type ParamKey = (u64, String);

fn param_values(snapshot: &Snapshot, device: Option<u64>) -> BTreeMap<ParamKey, Value> {
    snapshot
        .iter()
        .filter(|d| device.is_none_or(|id| d.id() == id))
        .flat_map(|d| {
            d.state
                .params
                .iter()
                .map(move |p| ((d.id(), p.code.clone()), p.value.clone()))
        })
        .collect()
}

/// Lines describing every value that differs between two views.
fn changes(before: &BTreeMap<ParamKey, Value>, after: &BTreeMap<ParamKey, Value>) -> Vec<String> {
    after
        .iter()
        .filter_map(|(key, value)| match before.get(key) {
            Some(old) if old == value => None,
            Some(old) => Some(format!("{} {} {old} -> {value}", key.0, key.1)),
            None => Some(format!("{} {} {value}", key.0, key.1)),
        })
        .collect()
}

pub async fn handle(
    coordinator: &Coordinator,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut stream = coordinator.subscribe();
    let mut status = coordinator.status();
    let mut last = param_values(stream.current(), args.device);

    output::print_output(
        &format!(
            "watching {} parameters ({} mode), Ctrl-C to stop",
            last.len(),
            coordinator.mode()
        ),
        global.quiet,
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                if *status.borrow_and_update() == SyncStatus::ReauthRequired {
                    return Err(CliError::AuthFailed { profile: "current".into() });
                }
            }
            snapshot = stream.changed() => {
                let Some(snapshot) = snapshot else { break };
                let next = param_values(&snapshot, args.device);
                let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                for line in changes(&last, &next) {
                    output::print_output(&format!("{stamp} {line}"), global.quiet);
                }
                last = next;
            }
        }
    }
    Ok(())
}
