use std::fs::OpenOptions;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use seriallink_channel::{ByteSink, Link, MAX_HANDLERS};
use seriallink_frame::RX_BUFFER_SIZE;
use seriallink_transport::StreamTransport;
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, MonitorArgs};
use crate::exit::{io_error, link_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{now_unix_seconds, print_event, EventOutput, OutputFormat};

const TICK: Duration = Duration::from_millis(1);

enum Event {
    Received { command: String, data: String },
    Failed { command: String, data: String, reason: &'static str },
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    if args.commands.len() > MAX_HANDLERS {
        return Err(CliError::new(
            USAGE,
            format!("at most {MAX_HANDLERS} commands can be monitored"),
        ));
    }
    let deadline = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|d| Instant::now() + d);

    let device = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&args.device)
        .map_err(|err| io_error(&format!("failed opening {}", args.device.display()), err))?;
    let reader = device
        .try_clone()
        .map_err(|err| io_error("failed cloning device handle", err))?;

    let channel = args.device.display().to_string();
    let mut link = Link::new();
    let sink = link
        .register(channel.as_str(), StreamTransport::new(device))
        .map_err(|err| link_error("register failed", err))?;

    let (events, inbox) = mpsc::channel();
    for command in &args.commands {
        let tx = events.clone();
        link.on_command(&channel, command, move |command, data| {
            let _ = tx.send(Event::Received {
                command: command.to_string(),
                data: data.to_string(),
            });
        })
        .map_err(|err| link_error("handler setup failed", err))?;
    }
    let tx = events.clone();
    link.on_failure(&channel, move |command, data, reason| {
        let _ = tx.send(Event::Failed {
            command: command.to_string(),
            data: data.to_string(),
            reason: reason.as_str(),
        });
    })
    .map_err(|err| link_error("handler setup failed", err))?;
    drop(events);

    spawn_reader(reader, sink);
    info!(device = %channel, commands = ?args.commands, "monitoring");

    if let Some(command) = &args.send {
        link.send(&channel, command, &args.data)
            .map_err(|err| link_error("send failed", err))?;
    } else if args.ping {
        link.ping(&channel)
            .map_err(|err| link_error("ping failed", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        link.tick();
        printed += drain(&inbox, &channel, format);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("monitor duration elapsed");
            break;
        }
        thread::sleep(TICK);
    }

    Ok(SUCCESS)
}

/// Print queued events; failures are printed but not counted.
fn drain(inbox: &Receiver<Event>, channel: &str, format: OutputFormat) -> usize {
    let mut received = 0;
    while let Ok(event) = inbox.try_recv() {
        let out = match event {
            Event::Received { command, data } => {
                received += 1;
                EventOutput {
                    event: "received",
                    channel: channel.to_string(),
                    command,
                    data,
                    reason: None,
                    timestamp: now_unix_seconds(),
                }
            }
            Event::Failed {
                command,
                data,
                reason,
            } => EventOutput {
                event: "failed",
                channel: channel.to_string(),
                command,
                data,
                reason: Some(reason),
                timestamp: now_unix_seconds(),
            },
        };
        print_event(&out, format);
    }
    received
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R, sink: ByteSink) {
    thread::spawn(move || {
        let mut buf = [0u8; RX_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("device reached end of input");
                    break;
                }
                Ok(n) => sink.push_slice(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "device read failed");
                    break;
                }
            }
        }
    });
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
