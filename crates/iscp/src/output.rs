use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use iscp_frame::Message;
use iscp_session::{CommandTable, DiscoveredDevice};
use serde::Serialize;

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
struct MessageOutput<'a> {
    device: &'a str,
    command: &'a str,
    argument: &'a str,
    code: String,
    timestamp: String,
}

pub fn print_message(message: &Message, device: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                device,
                command: &message.command,
                argument: &message.argument,
                code: message.to_string(),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["DEVICE", "COMMAND", "ARGUMENT"]);
            table.add_row(vec![
                device.to_string(),
                message.command.clone(),
                message.argument.clone(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={} command={} argument={}",
                device, message.command, message.argument
            );
        }
        OutputFormat::Raw => println!("{message}"),
    }
}

#[derive(Serialize)]
struct DeviceOutput<'a> {
    ip: String,
    port: u16,
    model: &'a str,
    region: &'a str,
    identifier: &'a str,
}

pub fn print_device(device: &DiscoveredDevice, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DeviceOutput {
                ip: device.ip.to_string(),
                port: device.port,
                model: &device.model,
                region: &device.region,
                identifier: &device.identifier,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["IP", "PORT", "MODEL", "REGION", "IDENTIFIER"]);
            table.add_row(vec![
                device.ip.to_string(),
                device.port.to_string(),
                device.model.clone(),
                device.region.clone(),
                device.identifier.clone(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} at {} (region {}, id {})",
                device.model,
                device.endpoint(),
                device.region,
                device.identifier
            );
        }
        OutputFormat::Raw => println!("{}", device.endpoint()),
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    phrase: &'a str,
    code: &'a str,
}

pub fn print_commands(table: &CommandTable, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<CommandOutput<'_>> = table
                .iter()
                .map(|(phrase, code)| CommandOutput { phrase, code })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut out = new_table(vec!["PHRASE", "CODE"]);
            for (phrase, code) in table.iter() {
                out.add_row(vec![phrase, code]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for (phrase, code) in table.iter() {
                println!("{phrase}\t{code}");
            }
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
