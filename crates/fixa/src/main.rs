mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "fixa", version, about = "Serve, inspect and tune live fixables")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        env = "FIXA_LOG_FORMAT",
        default_value = "text",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "FIXA_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    /// Extra tracing filter directives, e.g. `fixa_frame=trace`.
    #[arg(long, value_name = "DIRECTIVES", env = "FIXA_LOG", global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = init_logging(cli.log_format, cli.log_level, cli.log_filter.as_deref())
        .and_then(|()| cmd::run(cli.command, format));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "fixa",
            "serve",
            "127.0.0.1:0",
            "--manifest",
            "fixables.json",
            "--name",
            "Demo",
        ])
        .expect("serve args should parse");

        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.stream_name, "Demo");
                assert_eq!(args.addr.port(), 0);
                assert!(args.count.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_requires_manifest() {
        let err = Cli::try_parse_from(["fixa", "serve", "127.0.0.1:0"])
            .expect_err("missing manifest should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_set_subcommand() {
        let cli = Cli::try_parse_from([
            "fixa",
            "--format",
            "json",
            "set",
            "localhost:7777",
            "Open",
            "true",
            "--timeout",
            "2s",
        ])
        .expect("set args should parse");
        match cli.command {
            Command::Set(args) => {
                assert_eq!(args.addr, "localhost:7777");
                assert_eq!(args.id, "Open");
                assert_eq!(args.value, "true");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_inspect_subcommand() {
        let cli = Cli::try_parse_from(["fixa", "inspect", "127.0.0.1:7777", "--timeout", "3s"])
            .expect("inspect args should parse");
        assert!(matches!(cli.command, Command::Inspect(_)));
    }

    #[test]
    fn parses_log_options() {
        let cli = Cli::try_parse_from([
            "fixa",
            "version",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "--log-filter",
            "fixa_frame=trace",
        ])
        .expect("log options should parse");
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_filter.as_deref(), Some("fixa_frame=trace"));
    }
}
