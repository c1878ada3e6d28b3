use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use seriallink_channel::ChannelStats;
use seriallink_frame::Frame;

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
pub struct FrameOutput<'a> {
    pub command: &'a str,
    pub data: &'a str,
    pub sequence: u8,
    pub checksum: String,
    pub valid: bool,
    pub frame: String,
}

impl<'a> FrameOutput<'a> {
    pub fn from_frame(frame: &'a Frame) -> Self {
        Self {
            command: frame.command(),
            data: frame.data(),
            sequence: frame.sequence,
            checksum: format!("{:02X}", frame.checksum),
            valid: frame.valid,
            frame: frame.to_string(),
        }
    }
}

pub fn print_frame(out: &FrameOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "DATA", "SEQ", "CRC", "VALID"])
                .add_row(vec![
                    out.command.to_string(),
                    out.data.to_string(),
                    format!("{:02X}", out.sequence),
                    out.checksum.clone(),
                    out.valid.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "command={} data={} seq={:02X} crc={} valid={}",
                out.command, out.data, out.sequence, out.checksum, out.valid
            );
        }
        OutputFormat::Raw => {
            print_raw(out.frame.as_bytes());
        }
    }
}

/// One received command or failed transaction seen by `monitor`.
#[derive(Serialize)]
pub struct EventOutput {
    pub event: &'static str,
    pub channel: String,
    pub command: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub timestamp: String,
}

pub fn print_event(out: &EventOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "CHANNEL", "COMMAND", "DATA"])
                .add_row(vec![
                    out.event.to_string(),
                    out.channel.clone(),
                    out.command.clone(),
                    out.data.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match out.reason {
            Some(reason) => println!(
                "{} channel={} command={} data={} reason={}",
                out.event, out.channel, out.command, out.data, reason
            ),
            None => println!(
                "{} channel={} command={} data={}",
                out.event, out.channel, out.command, out.data
            ),
        },
        OutputFormat::Raw => {
            print_raw(format!("{}:{}\n", out.command, out.data).as_bytes());
        }
    }
}

/// Print per-channel counters as `(label, stats)` rows.
pub fn print_stats_table(rows: &[(&str, &ChannelStats)]) {
    let mut header = vec!["COUNTER".to_string()];
    header.extend(rows.iter().map(|(label, _)| label.to_uppercase()));

    let values: Vec<serde_json::Value> = rows
        .iter()
        .map(|(_, stats)| serde_json::to_value(stats).unwrap_or_default())
        .collect();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    let Some(serde_json::Value::Object(first)) = values.first() else {
        println!("{table}");
        return;
    };
    for key in first.keys() {
        let mut row = vec![key.clone()];
        row.extend(values.iter().map(|value| match &value[key.as_str()] {
            serde_json::Value::Null => "-".to_string(),
            other => other.to_string(),
        }));
        table.add_row(row);
    }
    println!("{table}");
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
