use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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
struct Listening<'a> {
    service: &'a str,
    listening: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    transport: &'a str,
    address: &'a str,
}

/// Announce the addresses a served service is reachable at.
pub fn print_listening(service: &str, addresses: &[(String, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out = Listening {
                service,
                listening: addresses
                    .iter()
                    .map(|(transport, address)| Address { transport, address })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVICE", "TRANSPORT", "ADDRESS"]);
            for (transport, address) in addresses {
                table.add_row(vec![service, transport.as_str(), address.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (transport, address) in addresses {
                println!("service={service} transport={transport} address={address}");
            }
        }
    }
    let _ = std::io::stdout().flush();
}

/// Print a call result.
pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Pretty => println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        ),
        OutputFormat::Raw => match value {
            Value::String(text) => print_raw(text.as_bytes()),
            other => print_raw(other.to_string().as_bytes()),
        },
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["RESULT"])
                .add_row(vec![value.to_string()]);
            println!("{table}");
        }
    }
}

/// Print the `method -> schema document` map returned by `$htGetAllSchemas`.
pub fn print_schemas(schemas: &Value, format: OutputFormat) {
    match (format, schemas) {
        (OutputFormat::Table, Value::Object(methods)) => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METHOD", "SCHEMA"]);
            for (method, document) in methods {
                table.add_row(vec![method.clone(), schema_cell(document)]);
            }
            println!("{table}");
        }
        (OutputFormat::Pretty, Value::Object(methods)) => {
            for (method, document) in methods {
                println!("{method}: {}", schema_cell(document));
            }
        }
        _ => print_value(schemas, format),
    }
}

fn schema_cell(document: &Value) -> String {
    match document {
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
