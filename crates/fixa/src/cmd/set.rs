use fixa_peer::{Controller, ControllerConfig};
use fixa_wire::{FixableId, FixableValue, RegistrationMessage, ValueKind};

use crate::cmd::{parse_duration, SetArgs};
use crate::exit::{peer_error, wire_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_value, OutputFormat};

pub fn run(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = ControllerConfig {
        connect_timeout: Some(timeout),
        ..ControllerConfig::default()
    };

    let controller = Controller::connect(args.addr.as_str(), config)
        .map_err(|err| peer_error("connect failed", err))?;
    let registration = controller
        .wait_live(timeout)
        .map_err(|err| peer_error("registration failed", err))?;

    let kind = value_kind(&registration, &args.id)?;
    let value = FixableValue::parse(kind, &args.value)
        .map_err(|err| wire_error(&format!("invalid value for {}", args.id), err))?;

    controller
        .set(&args.id, value)
        .map_err(|err| peer_error("set failed", err))?;
    controller
        .disconnect()
        .map_err(|err| peer_error("disconnect failed", err))?;

    print_value("sent", &FixableId::from(args.id.as_str()), &value, format);
    Ok(SUCCESS)
}

fn value_kind(registration: &RegistrationMessage, id: &str) -> CliResult<ValueKind> {
    let config = registration
        .config(id)
        .ok_or_else(|| CliError::new(USAGE, format!("device has no fixable {id}")))?;
    config.kind().ok_or_else(|| {
        CliError::new(
            USAGE,
            format!("fixable {id} is a {} and holds no value", config.variant_name()),
        )
    })
}

#[cfg(test)]
mod tests {
    use fixa_wire::FixableConfig;

    use super::*;

    fn registration() -> RegistrationMessage {
        RegistrationMessage {
            stream_name: "Demo".to_string(),
            fixables: vec![
                ("Size".into(), FixableConfig::float("Size", 0.0, 1.0)),
                (
                    "Look".into(),
                    FixableConfig::group("Look", [("Tint", FixableConfig::color("Tint"))]),
                ),
            ],
            values: Default::default(),
        }
    }

    #[test]
    fn kind_comes_from_registration() {
        let reg = registration();
        assert_eq!(value_kind(&reg, "Size").unwrap(), ValueKind::Float);
        assert_eq!(value_kind(&reg, "Tint").unwrap(), ValueKind::Color);
    }

    #[test]
    fn groups_and_unknown_ids_are_usage_errors() {
        let reg = registration();
        assert_eq!(value_kind(&reg, "Look").unwrap_err().code, USAGE);
        assert_eq!(value_kind(&reg, "Nope").unwrap_err().code, USAGE);
    }
}
