use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use seriallink_channel::{ByteSink, ChannelConfig, ChannelStats, Link};
use seriallink_frame::{PING, PING_DATA, PONG};
use seriallink_transport::{Clock, ManualClock, MemoryHandle, MemoryTransport};
use tracing::{debug, info, warn};

use crate::cmd::LoopbackArgs;
use crate::exit::{link_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, print_stats_table, OutputFormat};

const PEER: &str = "loop";

/// Simulated time one round trip may take before it is abandoned.
const ROUND_BUDGET_MS: u64 = 5_000;

/// Counts frames crossing the simulated wire and drops every Nth one.
struct Loss {
    every: u32,
    seen: u32,
    dropped: u32,
}

impl Loss {
    fn keep(&mut self) -> bool {
        self.seen = self.seen.wrapping_add(1);
        if self.every > 0 && self.seen % self.every == 0 {
            self.dropped += 1;
            return false;
        }
        true
    }
}

/// One direction of the simulated cable.
///
/// Frames are handed over one at a time, and only when the receiver's slot
/// is free, the way a real UART interleaves with the tick.
struct Wire {
    from: MemoryHandle,
    to: ByteSink,
    queue: VecDeque<Vec<u8>>,
}

impl Wire {
    fn new(from: MemoryHandle, to: ByteSink) -> Self {
        Self {
            from,
            to,
            queue: VecDeque::new(),
        }
    }

    fn pump(&mut self, loss: &mut Loss) {
        self.queue.extend(self.from.take_sent());
        if self.to.is_pending() {
            return;
        }
        if let Some(frame) = self.queue.pop_front() {
            if loss.keep() {
                self.to.push_slice(&frame);
            } else {
                debug!(len = frame.len(), "frame dropped on simulated wire");
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.from.sent_count() == 0 && !self.to.is_pending()
    }
}

#[derive(Serialize)]
struct LoopbackOutput {
    rounds: u32,
    acknowledged: u64,
    pongs: u32,
    failures: u32,
    dropped_frames: u32,
    elapsed_ms: u64,
    left: ChannelStats,
    right: ChannelStats,
}

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let clock = ManualClock::new();
    let config = ChannelConfig {
        max_retry: args.max_retry,
        ..ChannelConfig::default()
    };
    let mut left = Link::with_clock(Arc::new(clock.clone())).with_config(config);
    let mut right = Link::with_clock(Arc::new(clock.clone())).with_config(config);

    let (left_tx, left_wire) = MemoryTransport::with_handle();
    let (right_tx, right_wire) = MemoryTransport::with_handle();
    let left_rx = left
        .register(PEER, left_tx)
        .map_err(|err| link_error("register failed", err))?;
    let right_rx = right
        .register(PEER, right_tx)
        .map_err(|err| link_error("register failed", err))?;

    let pongs = Arc::new(AtomicU32::new(0));
    let failures = Arc::new(AtomicU32::new(0));
    let pong_due = Arc::new(AtomicBool::new(false));

    let due = Arc::clone(&pong_due);
    right
        .on_command(PEER, PING, move |_, _| due.store(true, Ordering::SeqCst))
        .map_err(|err| link_error("handler setup failed", err))?;
    let received = Arc::clone(&pongs);
    left.on_command(PEER, PONG, move |_, _| {
        received.fetch_add(1, Ordering::SeqCst);
    })
    .map_err(|err| link_error("handler setup failed", err))?;
    for (side, link) in [("left", &mut left), ("right", &mut right)] {
        let failed = Arc::clone(&failures);
        link.on_failure(PEER, move |command, _, reason| {
            warn!(side, command, %reason, "transaction failed");
            failed.fetch_add(1, Ordering::SeqCst);
        })
        .map_err(|err| link_error("handler setup failed", err))?;
    }

    let mut to_right = Wire::new(left_wire, right_rx);
    let mut to_left = Wire::new(right_wire, left_rx);
    let mut loss = Loss {
        every: args.drop_every,
        seen: 0,
        dropped: 0,
    };

    for round in 1..=args.count {
        left.ping(PEER)
            .map_err(|err| link_error("ping failed", err))?;
        let started = clock.now_ms();

        let mut settled = false;
        while clock.now_ms() - started < ROUND_BUDGET_MS {
            clock.advance(1);
            to_right.pump(&mut loss);
            to_left.pump(&mut loss);
            left.tick();
            right.tick();

            if pong_due.load(Ordering::SeqCst) && right.is_ready(PEER) {
                pong_due.store(false, Ordering::SeqCst);
                right
                    .send(PEER, PONG, PING_DATA)
                    .map_err(|err| link_error("pong failed", err))?;
            }

            if left.is_ready(PEER)
                && right.is_ready(PEER)
                && !pong_due.load(Ordering::SeqCst)
                && to_right.is_idle()
                && to_left.is_idle()
            {
                settled = true;
                break;
            }
        }

        if settled {
            debug!(round, elapsed_ms = clock.now_ms() - started, "round settled");
        } else {
            warn!(round, "round did not settle");
        }
    }

    let left_stats = left.stats(PEER).unwrap_or_default();
    let right_stats = right.stats(PEER).unwrap_or_default();
    let out = LoopbackOutput {
        rounds: args.count,
        acknowledged: left_stats.ping_success,
        pongs: pongs.load(Ordering::SeqCst),
        failures: failures.load(Ordering::SeqCst),
        dropped_frames: loss.dropped,
        elapsed_ms: clock.now_ms(),
        left: left_stats,
        right: right_stats,
    };
    info!(
        rounds = out.rounds,
        pongs = out.pongs,
        failures = out.failures,
        "loopback finished"
    );
    print_loopback(&out, format);

    if out.failures == 0 && out.pongs == out.rounds {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}

fn print_loopback(out: &LoopbackOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(out),
        OutputFormat::Table => {
            println!(
                "rounds={} acknowledged={} pongs={} failures={} dropped={} elapsed_ms={}",
                out.rounds,
                out.acknowledged,
                out.pongs,
                out.failures,
                out.dropped_frames,
                out.elapsed_ms
            );
            print_stats_table(&[("left", &out.left), ("right", &out.right)]);
        }
        OutputFormat::Pretty => {
            println!(
                "rounds={} acknowledged={} pongs={} failures={} dropped={} elapsed_ms={}",
                out.rounds,
                out.acknowledged,
                out.pongs,
                out.failures,
                out.dropped_frames,
                out.elapsed_ms
            );
            println!(
                "left: tx={} retry={} avg_delay_ms={}",
                out.left.tx_count, out.left.tx_retry, out.left.avg_delay_ms
            );
            println!(
                "right: tx={} retry={} avg_delay_ms={}",
                out.right.tx_count, out.right.tx_retry, out.right.avg_delay_ms
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_drops_every_nth() {
        let mut loss = Loss {
            every: 3,
            seen: 0,
            dropped: 0,
        };
        let kept: Vec<bool> = (0..6).map(|_| loss.keep()).collect();
        assert_eq!(kept, vec![true, true, false, true, true, false]);
        assert_eq!(loss.dropped, 2);
    }

    #[test]
    fn no_loss_when_disabled() {
        let mut loss = Loss {
            every: 0,
            seen: 0,
            dropped: 0,
        };
        assert!((0..100).all(|_| loss.keep()));
    }
}
