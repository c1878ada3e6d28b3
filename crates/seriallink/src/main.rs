mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "seriallink", version, about = "Serial command link CLI")]
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

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

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
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from(["seriallink", "encode", "GET", "TEMP", "--seq", "7"])
            .expect("encode args should parse");
        match cli.command {
            Command::Encode(args) => {
                assert_eq!(args.command, "GET");
                assert_eq!(args.data, "TEMP");
                assert_eq!(args.seq, 7);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_ping_with_send() {
        let err = Cli::try_parse_from([
            "seriallink",
            "monitor",
            "/dev/ttyUSB0",
            "--send",
            "GET",
            "--ping",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn monitor_commands_split_on_comma() {
        let cli = Cli::try_parse_from([
            "seriallink",
            "monitor",
            "/dev/ttyUSB0",
            "--commands",
            "GET,SET",
        ])
        .expect("monitor args should parse");
        match cli.command {
            Command::Monitor(args) => assert_eq!(args.commands, vec!["GET", "SET"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
