//! Two links wired back to back in memory.
//!
//! The left side sends `GET:TEMP`; the right side answers from its handler
//! with `TEMP:21.5`. Everything runs on a manual clock so the output is the
//! same every time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use seriallink::channel::Link;
use seriallink::transport::{ManualClock, MemoryTransport};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let clock = ManualClock::new();
    let mut left = Link::with_clock(Arc::new(clock.clone()));
    let mut right = Link::with_clock(Arc::new(clock.clone()));

    let (left_tx, left_wire) = MemoryTransport::with_handle();
    let (right_tx, right_wire) = MemoryTransport::with_handle();
    let left_rx = left.register("uart", left_tx)?;
    let right_rx = right.register("uart", right_tx)?;

    let requests = Arc::new(Mutex::new(VecDeque::new()));
    let queue = Arc::clone(&requests);
    right.on_command("uart", "GET", move |_, data| {
        if let Ok(mut queue) = queue.lock() {
            queue.push_back(data.to_string());
        }
    })?;
    left.on_command("uart", "TEMP", |_, data| {
        println!("left  <- TEMP {data}");
    })?;
    left.on_state_change("uart", |old, new, retry| {
        println!("left  state {old} -> {new} (retry {retry})");
    })?;

    left.send("uart", "GET", "TEMP")?;

    let mut to_right = VecDeque::new();
    let mut to_left = VecDeque::new();
    for _ in 0..20 {
        clock.advance(1);
        to_right.extend(left_wire.take_sent());
        to_left.extend(right_wire.take_sent());

        if let Some(frame) = to_right.pop_front() {
            println!("wire  -> {}", String::from_utf8_lossy(&frame));
            right_rx.push_slice(&frame);
        }
        if let Some(frame) = to_left.pop_front() {
            println!("wire  <- {}", String::from_utf8_lossy(&frame));
            left_rx.push_slice(&frame);
        }

        left.tick();
        right.tick();

        let pending = requests.lock().ok().and_then(|mut q| q.pop_front());
        if let Some(what) = pending {
            if right.is_ready("uart") {
                println!("right <- GET {what}");
                right.send("uart", "TEMP", "21.5")?;
            }
        }
    }

    if let Some(stats) = left.stats("uart") {
        println!(
            "left  sent={} acked={} avg_delay_ms={}",
            stats.tx_count, stats.tx_success, stats.avg_delay_ms
        );
    }
    Ok(())
}
