//! `compit set <device> <code> <value>`: one parameter write.

use serde_json::Value;

use compit_core::{Coordinator, CoreError, Parameter};

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    coordinator: &Coordinator,
    args: SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let instance = coordinator
        .device(args.device)
        .ok_or(CoreError::DeviceNotFound {
            device_id: args.device,
        })?;
    let parameter =
        instance
            .definition
            .parameter(&args.code)
            .ok_or_else(|| CoreError::ParameterNotFound {
                device_id: args.device,
                code: args.code.clone(),
            })?;
    if parameter.is_read_only() {
        return Err(CliError::Validation {
            field: args.code,
            reason: "parameter is read-only".into(),
        });
    }

    let value = parse_value(parameter, &args.value)?;
    tracing::debug!(device_id = args.device, code = %args.code, %value, "writing");
    coordinator
        .set_parameter(args.device, &args.code, value)
        .await?;

    let current = coordinator
        .param(args.device, &args.code)
        .map(|p| p.value.to_string());
    output::print_output(
        &format!(
            "{} {} = {}",
            instance.label(),
            parameter.label,
            output::or_dash(current)
        ),
        global.quiet,
    );
    Ok(())
}

/// Interpret `raw` for `parameter`: an option description maps to its
/// detail state, otherwise a JSON scalar, otherwise a plain string.
fn parse_value(parameter: &Parameter, raw: &str) -> Result<Value, CliError> {
    if let Some(detail) = parameter.detail_by_description(raw) {
        return Ok(Value::from(detail.state));
    }

    let parsed = serde_json::from_str::<Value>(raw).ok();
    if let Some(value @ (Value::Number(_) | Value::Bool(_))) = parsed {
        if parameter.details().is_empty()
            || value
                .as_i64()
                .is_some_and(|v| parameter.detail_by_state(v).is_some())
        {
            return Ok(value);
        }
    }

    if parameter.details().is_empty() {
        return Ok(Value::String(raw.to_owned()));
    }

    let options: Vec<&str> = parameter
        .details()
        .iter()
        .map(|d| d.description.as_str())
        .collect();
    Err(CliError::Validation {
        field: parameter.parameter_code.clone(),
        reason: format!("expected one of: {}", options.join(", ")),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parameter(details: bool) -> Parameter {
        let details = details.then(|| {
            json!([
                { "State": 0, "Description": "Off", "Param": "__off" },
                { "State": 1, "Description": "On", "Param": "__on" }
            ])
        });
        serde_json::from_value(json!({
            "ParameterCode": "__p",
            "Label": "P",
            "ReadWrite": "RW",
            "Details": details
        }))
        .unwrap()
    }

    #[test]
    fn option_descriptions_map_to_states() {
        assert_eq!(parse_value(&parameter(true), "On").unwrap(), json!(1));
        assert_eq!(parse_value(&parameter(true), "0").unwrap(), json!(0));
        assert!(parse_value(&parameter(true), "7").is_err());
        assert!(parse_value(&parameter(true), "Maybe").is_err());
    }

    #[test]
    fn plain_parameters_take_scalars() {
        assert_eq!(parse_value(&parameter(false), "21.5").unwrap(), json!(21.5));
        assert_eq!(parse_value(&parameter(false), "true").unwrap(), json!(true));
        assert_eq!(parse_value(&parameter(false), "eco").unwrap(), json!("eco"));
    }
}
