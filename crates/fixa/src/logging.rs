use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};

/// Crates whose events follow `--log-level`. Everything else stays at `warn`.
const FIXA_TARGETS: &[&str] = &[
    "fixa",
    "fixa_transport",
    "fixa_frame",
    "fixa_wire",
    "fixa_registry",
    "fixa_peer",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// `warn` globally, `level` for the fixa crates, then any `extra`
/// directives, which win on conflict.
fn filter_directives(level: LogLevel, extra: Option<&str>) -> String {
    let level = level.directive();
    let mut directives = vec!["warn".to_string()];
    directives.extend(FIXA_TARGETS.iter().map(|target| format!("{target}={level}")));
    if let Some(extra) = extra.map(str::trim).filter(|extra| !extra.is_empty()) {
        directives.push(extra.to_string());
    }
    directives.join(",")
}

/// Install the stderr subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init_logging(format: LogFormat, level: LogLevel, extra: Option<&str>) -> CliResult<()> {
    let filter = EnvFilter::try_new(filter_directives(level, extra))
        .map_err(|err| CliError::new(USAGE, format!("invalid log filter: {err}")))?;
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_thread_names(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| CliError::new(INTERNAL, format!("failed to start logging: {err}")))
}
