use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod inspect;
pub mod serve;
pub mod set;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve fixables from a manifest as a device.
    Serve(ServeArgs),
    /// Connect to a device and print its fixables.
    Inspect(InspectArgs),
    /// Connect to a device and change one value.
    Set(SetArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Set(args) => set::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (port 0 picks a free port).
    pub addr: SocketAddr,
    /// JSON manifest declaring the fixables.
    #[arg(long, short = 'm', value_name = "FILE")]
    pub manifest: PathBuf,
    /// Stream name announced to controllers.
    #[arg(long = "name", env = "FIXA_STREAM_NAME", default_value = "fixa")]
    pub stream_name: String,
    /// Device name for the discovery record.
    #[arg(long, default_value = "Unknown device")]
    pub device_name: String,
    /// Exit after N values have been applied.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Device address (host:port).
    pub addr: String,
    /// How long to wait for the connection and registration (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Device address (host:port).
    pub addr: String,
    /// Fixable id.
    pub id: String,
    /// New value: true/false, a number, or #rrggbb[aa].
    pub value: String,
    /// How long to wait for the connection and registration (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 2 ").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_rejects_bad_input() {
        for input in ["", "0s", "fast", "-1s"] {
            let err = parse_duration(input).unwrap_err();
            assert_eq!(err.code, USAGE, "input {input:?}");
        }
    }
}
