use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod crc;
pub mod decode;
pub mod encode;
pub mod loopback;
pub mod monitor;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a command frame.
    Encode(EncodeArgs),
    /// Decode and verify a frame.
    Decode(DecodeArgs),
    /// Compute the CRC-8 of some text.
    Crc(CrcArgs),
    /// Run two in-memory links against each other and print their counters.
    Loopback(LoopbackArgs),
    /// Attach to a serial device and print received commands.
    Monitor(MonitorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Crc(args) => crc::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command name (up to 16 characters).
    pub command: String,
    /// Command data (up to 64 characters).
    #[arg(default_value = "")]
    pub data: String,
    /// Sequence number to place in the frame.
    #[arg(long, short = 's', default_value = "1")]
    pub seq: u8,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame text, e.g. '{GET:TEMP#01#5C}'. Reads stdin when omitted or '-'.
    pub frame: Option<String>,
}

#[derive(Args, Debug)]
pub struct CrcArgs {
    /// Text to checksum.
    #[arg(conflicts_with = "hex")]
    pub text: Option<String>,
    /// Bytes to checksum, as hex (e.g. 313233).
    #[arg(long)]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Number of PING round trips.
    #[arg(long, short = 'n', default_value = "5")]
    pub count: u32,
    /// Drop every Nth frame on the simulated wire (0 keeps every frame).
    #[arg(long, default_value = "0")]
    pub drop_every: u32,
    /// Retransmissions before a command is reported as failed.
    #[arg(long, default_value = "3")]
    pub max_retry: u8,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial device node (already configured, e.g. with stty) or any readable file.
    pub device: PathBuf,
    /// Commands to print (comma-separated, up to 8).
    #[arg(long, value_delimiter = ',', default_value = "PING,PONG")]
    pub commands: Vec<String>,
    /// Send this command once attached.
    #[arg(long)]
    pub send: Option<String>,
    /// Data for --send.
    #[arg(long, default_value = "", requires = "send")]
    pub data: String,
    /// Send PING once attached.
    #[arg(long, conflicts_with = "send")]
    pub ping: bool,
    /// Exit after printing N commands.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit after this long (e.g. 10s, 500ms).
    #[arg(long)]
    pub duration: Option<String>,
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
