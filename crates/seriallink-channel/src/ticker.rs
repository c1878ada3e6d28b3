use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::link::Link;

/// Default tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Drive [`Link::tick`] every `period` until `shutdown` is cancelled.
///
/// The link lock is held only for the duration of one tick, so other tasks
/// can send and register handlers in between.
///
/// A tick may block on transport writes for up to the configured send
/// timeout. On a multi-thread runtime the tick runs under
/// [`tokio::task::block_in_place`] so other tasks move to another worker.
/// On a current-thread runtime a blocking transport stalls the whole runtime
/// for that long.
pub async fn run_ticker(link: Arc<Mutex<Link>>, period: Duration, shutdown: CancellationToken) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(?period, "ticker started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticks.tick() => tick_once(&link),
        }
    }
    debug!("ticker stopped");
}

fn tick_once(link: &Mutex<Link>) {
    let tick = || link.lock().unwrap_or_else(PoisonError::into_inner).tick();
    match Handle::current().runtime_flavor() {
        RuntimeFlavor::MultiThread => tokio::task::block_in_place(tick),
        _ => tick(),
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use seriallink_frame::{encode_ack, encode_frame};
    use seriallink_transport::{ManualClock, MemoryTransport};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticker_processes_pending_frames_until_cancelled() {
        let mut link = Link::with_clock(Arc::new(ManualClock::new()));
        let (transport, wire) = MemoryTransport::with_handle();
        let sink = link.register("uart", transport).unwrap();
        let link = Arc::new(Mutex::new(link));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_ticker(
            Arc::clone(&link),
            DEFAULT_TICK_PERIOD,
            shutdown.clone(),
        ));

        let mut frame = BytesMut::new();
        encode_frame("SET", "LED", 1, &mut frame).unwrap();
        sink.push_slice(&frame);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut ack = BytesMut::new();
        encode_ack(1, &mut ack).unwrap();
        assert_eq!(wire.take_sent(), vec![ack.to_vec()]);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ticker_runs_on_multi_thread_runtime() {
        let mut link = Link::with_clock(Arc::new(ManualClock::new()));
        let (transport, wire) = MemoryTransport::with_handle();
        let sink = link.register("uart", transport).unwrap();
        let link = Arc::new(Mutex::new(link));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_ticker(
            Arc::clone(&link),
            DEFAULT_TICK_PERIOD,
            shutdown.clone(),
        ));

        let mut frame = BytesMut::new();
        encode_frame("GET", "TEMP", 1, &mut frame).unwrap();
        sink.push_slice(&frame);

        let mut waited = 0;
        while wire.sent_count() == 0 && waited < 1000 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 5;
        }

        let mut ack = BytesMut::new();
        encode_ack(1, &mut ack).unwrap();
        assert_eq!(wire.take_sent(), vec![ack.to_vec()]);

        shutdown.cancel();
        task.await.unwrap();
    }
}
