// ── Push delta merge ──
//
// Field-by-field application of a partial state onto the stored one.
// Present fields overwrite, absent fields are left alone, unknown codes
// are appended.

use chrono::{DateTime, SecondsFormat, Utc};
use compit_api::{DeviceState, Param, ParamDelta, StateDelta};

/// Merge `delta` into `state`.
///
/// `last_connected_at` is refreshed on every merge: the delta's value when
/// it carries one, `now` otherwise.
pub fn apply_delta(state: &mut DeviceState, delta: &StateDelta, now: DateTime<Utc>) {
    if let Some(errors) = &delta.errors {
        state.errors.clone_from(errors);
    }

    state.last_connected_at = Some(
        delta
            .last_connected_at
            .clone()
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );

    for change in &delta.params {
        match state.params.iter_mut().find(|p| p.code == change.code) {
            Some(param) => apply_param(param, change),
            None => state.params.push(new_param(change)),
        }
    }
}

fn apply_param(param: &mut Param, change: &ParamDelta) {
    if let Some(value) = &change.value {
        param.value.clone_from(value);
    }
    if let Some(hidden) = change.hidden {
        param.hidden = hidden;
    }
    if change.min.is_some() {
        param.min = change.min;
    }
    if change.max.is_some() {
        param.max = change.max;
    }
    if change.value_code.is_some() {
        param.value_code.clone_from(&change.value_code);
    }
    if change.value_label.is_some() {
        param.value_label.clone_from(&change.value_label);
    }
    if let Some(write) = change.write {
        param.write = write;
    }
    if change.ext_info.is_some() {
        param.ext_info.clone_from(&change.ext_info);
    }
}

fn new_param(change: &ParamDelta) -> Param {
    Param {
        code: change.code.clone(),
        value: change.value.clone().unwrap_or_default(),
        hidden: change.hidden.unwrap_or(false),
        min: change.min,
        max: change.max,
        value_code: change.value_code.clone(),
        value_label: change.value_label.clone(),
        write: change.write.unwrap_or(false),
        ext_info: change.ext_info.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn state() -> DeviceState {
        serde_json::from_value(json!({
            "errors": [],
            "last_connected_at": "2026-10-01T10:00:00Z",
            "params": [
                { "code": "__tpokzadana", "value": 21, "min": 10, "max": 30, "write": true },
                { "code": "__tpokojowa", "value": 20.5, "value_label": "20.5 °C" }
            ]
        }))
        .unwrap()
    }

    fn delta(value: serde_json::Value) -> StateDelta {
        serde_json::from_value(value).unwrap()
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, h, 0, 0).unwrap()
    }

    #[test]
    fn updates_only_named_param() {
        let mut s = state();
        apply_delta(
            &mut s,
            &delta(json!({ "params": [{ "code": "__tpokzadana", "value": 22 }] })),
            at(12),
        );

        let target = s.param("__tpokzadana").unwrap();
        assert_eq!(target.value, json!(22));
        assert_eq!(target.min, Some(10.0));
        assert_eq!(target.max, Some(30.0));
        assert!(target.write);
        assert_eq!(s.param("__tpokojowa").unwrap(), &state().params[1]);
    }

    #[test]
    fn absent_fields_are_untouched() {
        let mut s = state();
        apply_delta(
            &mut s,
            &delta(json!({ "params": [{ "code": "__tpokojowa", "value": 21.0, "value_label": null }] })),
            at(12),
        );
        let room = s.param("__tpokojowa").unwrap();
        assert_eq!(room.value, json!(21.0));
        assert_eq!(room.value_label.as_deref(), Some("20.5 °C"));
    }

    #[test]
    fn unknown_codes_are_appended() {
        let mut s = state();
        apply_delta(
            &mut s,
            &delta(json!({ "params": [{ "code": "__co2", "value": 640 }] })),
            at(12),
        );
        assert_eq!(s.params.len(), 3);
        assert_eq!(s.param("__co2").unwrap().value, json!(640));
    }

    #[test]
    fn merge_is_idempotent() {
        let d = delta(json!({
            "errors": [{ "code": 3 }],
            "params": [
                { "code": "__tpokzadana", "value": 23, "max": 28 },
                { "code": "__co2", "value": 700 }
            ]
        }));

        let mut once = state();
        apply_delta(&mut once, &d, at(12));
        let mut twice = once.clone();
        apply_delta(&mut twice, &d, at(12));

        assert_eq!(once, twice);
    }

    #[test]
    fn last_connected_at_is_refreshed() {
        let mut s = state();
        apply_delta(&mut s, &StateDelta::default(), at(12));
        assert_eq!(s.last_connected_at.as_deref(), Some("2026-10-17T12:00:00Z"));

        apply_delta(
            &mut s,
            &delta(json!({ "last_connected_at": "2026-10-17T12:30:00Z" })),
            at(13),
        );
        assert_eq!(s.last_connected_at.as_deref(), Some("2026-10-17T12:30:00Z"));
    }

    #[test]
    fn errors_replaced_only_when_present() {
        let mut s = state();
        apply_delta(&mut s, &delta(json!({ "errors": [{ "code": 7 }] })), at(12));
        assert_eq!(s.errors.len(), 1);

        apply_delta(&mut s, &delta(json!({ "params": [] })), at(12));
        assert_eq!(s.errors.len(), 1);
    }
}
