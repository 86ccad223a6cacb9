mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{Command, Globals};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "iscp", version, about = "Onkyo/Integra receiver control CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Extra command-table entries: a JSON object of "phrase": "CODE".
    #[arg(
        long = "commands",
        value_name = "FILE",
        env = "ISCP_COMMANDS",
        global = true
    )]
    command_table: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let globals = Globals {
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        commands: cli.command_table,
    };
    let result = cmd::run(cli.command, &globals);

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
    fn parses_send_with_several_commands() {
        let cli = Cli::try_parse_from([
            "iscp",
            "send",
            "power on",
            "volume up",
            "--device",
            "192.168.1.20",
            "--wait",
            "500ms",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.commands, ["power on", "volume up"]);
        assert_eq!(args.device.device.as_deref(), Some("192.168.1.20"));
        assert_eq!(args.wait, "500ms");
    }

    #[test]
    fn send_requires_a_command() {
        let err = Cli::try_parse_from(["iscp", "send", "--device", "10.0.0.2"])
            .expect_err("send without commands should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_discover_target() {
        let cli = Cli::try_parse_from([
            "iscp",
            "discover",
            "--target",
            "192.168.1.255:60128",
            "--timeout",
            "3s",
        ])
        .expect("discover args should parse");
        let Command::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        assert_eq!(args.target.map(|t| t.port()), Some(60128));
    }

    #[test]
    fn rejects_malformed_discover_target() {
        let err = Cli::try_parse_from(["iscp", "discover", "--target", "not-an-address"])
            .expect_err("target must be a socket address");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "iscp",
            "commands",
            "--format",
            "json",
            "--commands",
            "/etc/iscp/extra.json",
        ])
        .expect("global flags should parse after the subcommand");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert_eq!(cli.command_table, Some(PathBuf::from("/etc/iscp/extra.json")));
    }
}
