use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::net::SocketAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fixa_peer::ServiceRecord;
use fixa_wire::{FixableConfig, FixableId, FixableValue, RegistrationMessage, UNORDERED};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListeningOutput {
    event: &'static str,
    address: SocketAddr,
    service_type: &'static str,
    service_name: String,
    txt: BTreeMap<String, String>,
}

pub fn print_listening(record: &ServiceRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ListeningOutput {
                event: "listening",
                address: record.endpoint,
                service_type: fixa_peer::SERVICE_TYPE,
                service_name: record.service_name(),
                txt: record.txt_record(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "listening on {} as \"{}\" ({})",
                record.endpoint,
                record.service_name(),
                fixa_peer::SERVICE_TYPE
            );
        }
    }
}

#[derive(Serialize)]
struct ValueOutput<'a> {
    event: &'static str,
    id: &'a str,
    kind: &'static str,
    value: String,
}

/// One applied value, as reported by `serve` and `set`.
pub fn print_value(event: &'static str, id: &FixableId, value: &FixableValue, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ValueOutput {
                event,
                id: id.as_str(),
                kind: value.kind().name(),
                value: value.to_string(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{event} {id} = {value}");
        }
    }
}

pub fn print_registration(registration: &RegistrationMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(registration).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "TYPE", "LABEL", "ORDER", "RANGE", "VALUE"]);
            for (depth, id, config) in rows(&registration.fixables, 0) {
                table.add_row(vec![
                    format!("{}{id}", "  ".repeat(depth)),
                    config.variant_name().to_string(),
                    config.label().to_string(),
                    order_text(config),
                    range_text(config),
                    value_text(registration, id),
                ]);
            }
            println!("stream: {}", registration.stream_name);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("stream: {}", registration.stream_name);
            for (depth, id, config) in rows(&registration.fixables, 0) {
                println!(
                    "{}{id} ({}) \"{}\" = {}",
                    "  ".repeat(depth),
                    config.variant_name(),
                    config.label(),
                    value_text(registration, id)
                );
            }
        }
    }
}

fn rows(
    fixables: &[(FixableId, FixableConfig)],
    depth: usize,
) -> Vec<(usize, &FixableId, &FixableConfig)> {
    let mut out = Vec::new();
    for (id, config) in fixables {
        out.push((depth, id, config));
        out.extend(rows(config.children(), depth + 1));
    }
    out
}

fn order_text(config: &FixableConfig) -> String {
    match config.order() {
        UNORDERED => "-".to_string(),
        order => order.to_string(),
    }
}

fn range_text(config: &FixableConfig) -> String {
    match config {
        FixableConfig::Float { min, max, .. } => format!("{min}..{max}"),
        _ => String::new(),
    }
}

fn value_text(registration: &RegistrationMessage, id: &FixableId) -> String {
    registration
        .values
        .get(id)
        .map(ToString::to_string)
        .unwrap_or_default()
}
