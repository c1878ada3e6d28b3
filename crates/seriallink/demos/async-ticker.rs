//! Driving a link from a tokio task.
//!
//! The ticker owns the periodic work; the main task only sends and waits.
//! An in-memory transport stands in for the serial port.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use seriallink::channel::{run_ticker, Link, DEFAULT_TICK_PERIOD};
use seriallink::frame::{encode_ack, encode_frame};
use seriallink::transport::MemoryTransport;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut link = Link::new();
    let (transport, wire) = MemoryTransport::with_handle();
    let sink = link.register("uart", transport)?;
    link.on_command("uart", "SET", |_, data| println!("handler <- SET {data}"))?;
    link.on_failure("uart", |command, data, reason| {
        println!("failed  {command}:{data} ({reason})");
    })?;
    let link = Arc::new(Mutex::new(link));

    let shutdown = CancellationToken::new();
    let ticker = tokio::spawn(run_ticker(
        Arc::clone(&link),
        DEFAULT_TICK_PERIOD,
        shutdown.clone(),
    ));

    // Pretend the peer sent a command.
    let mut incoming = BytesMut::new();
    encode_frame("SET", "LED=1", 1, &mut incoming)?;
    sink.push_slice(&incoming);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Send our own command and acknowledge it a little later.
    link.lock().map_err(|_| "link lock poisoned")?.send("uart", "GET", "TEMP")?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut ack = BytesMut::new();
    encode_ack(1, &mut ack)?;
    sink.push_slice(&ack);
    tokio::time::sleep(Duration::from_millis(10)).await;

    for frame in wire.take_sent() {
        println!("wire    -> {}", String::from_utf8_lossy(&frame));
    }
    println!(
        "state   {}",
        link.lock().map_err(|_| "link lock poisoned")?.state_label("uart")
    );

    shutdown.cancel();
    ticker.await?;
    Ok(())
}
