// ── Parameter classifier ──
//
// Pure, ordered rule set mapping a definition parameter plus its live
// value record to the entity platform that exposes it. First match wins.

use compit_api::{Param, Parameter};
use serde::Serialize;
use strum::{Display, EnumIter};

/// Entity platform a parameter is exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Sensor,
    Number,
    Select,
    Switch,
    /// Composite adapter; never produced by [`classify`].
    Climate,
}

/// Decide which platform (if any) exposes `parameter`.
///
/// 1. no live param, or a hidden one: not exposed
/// 2. read-only: sensor
/// 3. both bounds defined: number
/// 4. details defined: two entries make a switch, anything else a select
/// 5. otherwise: not exposed
pub fn classify(parameter: &Parameter, live: Option<&Param>) -> Option<Platform> {
    let live = live?;
    if live.hidden {
        return None;
    }
    if parameter.is_read_only() {
        return Some(Platform::Sensor);
    }
    if parameter.min_value.is_some() && parameter.max_value.is_some() {
        return Some(Platform::Number);
    }
    match parameter.details.as_deref() {
        Some([_, _]) => Some(Platform::Switch),
        Some(_) => Some(Platform::Select),
        None => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use compit_api::{ParameterDetail, ReadWrite};
    use serde_json::json;

    fn parameter(
        read_write: ReadWrite,
        bounds: Option<(f64, f64)>,
        details: Option<usize>,
    ) -> Parameter {
        Parameter {
            parameter_code: "__p".into(),
            label: "P".into(),
            read_write,
            details: details.map(|n| {
                (0..n)
                    .map(|i| ParameterDetail {
                        state: i64::try_from(i).unwrap(),
                        description: format!("State {i}"),
                        param: format!("__s{i}"),
                    })
                    .collect()
            }),
            min_value: bounds.map(|b| b.0),
            max_value: bounds.map(|b| b.1),
            unit: None,
        }
    }

    fn live(hidden: bool) -> Param {
        serde_json::from_value(json!({ "code": "__p", "value": 1, "hidden": hidden })).unwrap()
    }

    #[test]
    fn absent_or_hidden_live_param_is_not_exposed() {
        let p = parameter(ReadWrite::ReadOnly, None, None);
        assert_eq!(classify(&p, None), None);
        assert_eq!(classify(&p, Some(&live(true))), None);
    }

    #[test]
    fn read_only_wins_over_bounds_and_details() {
        let p = parameter(ReadWrite::ReadOnly, Some((0.0, 10.0)), Some(2));
        assert_eq!(classify(&p, Some(&live(false))), Some(Platform::Sensor));
    }

    #[test]
    fn bounds_win_over_details() {
        let p = parameter(ReadWrite::ReadWrite, Some((10.0, 30.0)), Some(2));
        assert_eq!(classify(&p, Some(&live(false))), Some(Platform::Number));
    }

    #[test]
    fn one_bound_is_not_enough() {
        let mut p = parameter(ReadWrite::ReadWrite, Some((10.0, 30.0)), None);
        p.max_value = None;
        assert_eq!(classify(&p, Some(&live(false))), None);
    }

    #[test]
    fn detail_count_picks_switch_or_select() {
        let visible = live(false);
        let two = parameter(ReadWrite::ReadWrite, None, Some(2));
        let three = parameter(ReadWrite::ReadWrite, None, Some(3));
        let one = parameter(ReadWrite::ReadWrite, None, Some(1));

        assert_eq!(classify(&two, Some(&visible)), Some(Platform::Switch));
        assert_eq!(classify(&three, Some(&visible)), Some(Platform::Select));
        assert_eq!(classify(&one, Some(&visible)), Some(Platform::Select));
    }

    #[test]
    fn unknown_access_token_is_writable() {
        let p = parameter(ReadWrite::Other, None, Some(4));
        assert_eq!(classify(&p, Some(&live(false))), Some(Platform::Select));
    }

    #[test]
    fn writable_without_shape_is_not_exposed() {
        let p = parameter(ReadWrite::ReadWrite, None, None);
        assert_eq!(classify(&p, Some(&live(false))), None);
    }
}
