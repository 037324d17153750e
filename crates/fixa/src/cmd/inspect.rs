use fixa_peer::{Controller, ControllerConfig};

use crate::cmd::{parse_duration, InspectArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_registration, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
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
    print_registration(&registration, format);

    controller
        .disconnect()
        .map_err(|err| peer_error("disconnect failed", err))?;
    Ok(SUCCESS)
}
