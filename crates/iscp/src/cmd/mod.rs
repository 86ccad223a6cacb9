use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use iscp_session::{discover, CommandTable, Session, SessionConfig};
use iscp_transport::{DeviceStream, Endpoint};
use tracing::info;

use crate::exit::{io_error, session_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod commands;
pub mod discover;
pub mod listen;
pub mod send;
pub mod version;

/// Device descriptor that means "find one with discovery".
const AUTO: &str = "auto";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Broadcast a discovery query and print the first receiver to answer.
    Discover(DiscoverArgs),
    /// Send commands and print what the receiver reports back.
    Send(SendArgs),
    /// Print messages from a receiver until interrupted.
    Listen(ListenArgs),
    /// List the phrases the command table understands.
    Commands,
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every subcommand.
#[derive(Debug)]
pub struct Globals {
    pub format: OutputFormat,
    pub commands: Option<PathBuf>,
}

pub fn run(command: Command, globals: &Globals) -> CliResult<i32> {
    match command {
        Command::Discover(args) => discover::run(args, globals.format),
        Command::Send(args) => send::run(args, globals),
        Command::Listen(args) => listen::run(args, globals),
        Command::Commands => commands::run(globals),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Serial device (/dev/ttyUSB0, COM3) or host[:port]. Omit or use "auto" to discover.
    #[arg(long, short = 'd', env = "ISCP_DEVICE")]
    pub device: Option<String>,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Where to send the query (default: 255.255.255.255:60128).
    #[arg(long, value_name = "ADDR")]
    pub target: Option<SocketAddr>,
    /// How long to wait for a reply (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Phrases ("volume up"), volume levels ("40%"), or wire codes ("PWR01").
    #[arg(required = true, value_name = "COMMAND")]
    pub commands: Vec<String>,
    #[command(flatten)]
    pub device: DeviceArgs,
    /// How long to wait for the receiver to acknowledge every command.
    #[arg(long, default_value = "2s")]
    pub wait: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// The built-in table, extended from `--commands` when given.
pub(crate) fn load_commands(path: Option<&PathBuf>) -> CliResult<CommandTable> {
    let table = CommandTable::default();
    let Some(path) = path else {
        return Ok(table);
    };
    let json = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    table
        .with_json(&json)
        .map_err(|err| session_error(&format!("bad command table {}", path.display()), err))
}

/// Open a session on the named device, discovering one when none is named.
///
/// Returns the session and a label for output.
pub(crate) fn open_session(
    device: &DeviceArgs,
    commands: Arc<CommandTable>,
) -> CliResult<(Session<DeviceStream>, String)> {
    let endpoint = match device.device.as_deref().map(str::trim) {
        None | Some("") => discovered_endpoint()?,
        Some(name) if name.eq_ignore_ascii_case(AUTO) => discovered_endpoint()?,
        Some(name) => {
            Endpoint::parse(name).map_err(|err| transport_error("bad --device", err))?
        }
    };

    let label = endpoint.to_string();
    let session = Session::open_endpoint(&endpoint, commands, SessionConfig::default())
        .map_err(|err| session_error(&format!("connect to {label} failed"), err))?;
    Ok((session, label))
}

fn discovered_endpoint() -> CliResult<Endpoint> {
    let device = discover().map_err(|err| session_error("discovery failed", err))?;
    info!(model = %device.model, endpoint = %device.endpoint(), "using discovered receiver");
    Ok(device.endpoint())
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
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
