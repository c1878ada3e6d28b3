//! Receive-side handoff between the byte path and the tick.
//!
//! The byte path (an interrupt-style callback, a reader thread) pushes bytes
//! through a [`ByteSink`]. It only ever touches the parser and the one-frame
//! slot, and raises the ready flag when a frame completes. The tick is the
//! only consumer: it takes the frame and clears the flag. While the flag is
//! raised every new byte is dropped and counted.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use seriallink_frame::{Frame, FrameParser};
use seriallink_transport::Clock;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct RxPath {
    parser: Mutex<FrameParser>,
    slot: Mutex<Option<Frame>>,
    ready: AtomicBool,
    dropped: AtomicU64,
}

impl RxPath {
    pub(crate) fn new(frame_timeout: Duration) -> Self {
        Self {
            parser: Mutex::new(FrameParser::with_timeout(frame_timeout)),
            slot: Mutex::new(None),
            ready: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Take the pending frame and release the slot.
    pub(crate) fn take(&self) -> Option<Frame> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        let frame = lock(&self.slot).take();
        self.ready.store(false, Ordering::Release);
        frame
    }

    /// Abandon a partial frame whose assembly deadline has passed.
    pub(crate) fn expire_stale(&self, now_ms: u64) -> bool {
        let mut parser = lock(&self.parser);
        if parser.is_expired(now_ms) {
            parser.reset();
            true
        } else {
            false
        }
    }

    /// Drop any partial or pending frame.
    pub(crate) fn clear(&self) {
        lock(&self.parser).reset();
        *lock(&self.slot) = None;
        self.ready.store(false, Ordering::Release);
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Producer end of a channel's receive path.
///
/// Cheap to clone; hand one to whatever reads the serial device. Never
/// blocks on protocol work, never transmits, never runs callbacks.
#[derive(Clone)]
pub struct ByteSink {
    rx: Arc<RxPath>,
    clock: Arc<dyn Clock>,
}

impl ByteSink {
    pub(crate) fn new(rx: Arc<RxPath>, clock: Arc<dyn Clock>) -> Self {
        Self { rx, clock }
    }

    /// Deliver one received byte.
    pub fn push(&self, byte: u8) {
        if self.rx.ready.load(Ordering::Acquire) {
            self.rx.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let now = self.clock.now_ms();
        let mut parser = lock(&self.rx.parser);
        if let Some(frame) = parser.push(byte, now) {
            *lock(&self.rx.slot) = Some(frame);
            self.rx.ready.store(true, Ordering::Release);
        }
    }

    /// Deliver a run of received bytes.
    pub fn push_slice(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.push(byte);
        }
    }

    /// Throw away any partial frame, e.g. after a receiver overrun.
    pub fn reset(&self) {
        lock(&self.rx.parser).reset();
    }

    /// True while a decoded frame waits for the next tick.
    pub fn is_pending(&self) -> bool {
        self.rx.ready.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ByteSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSink")
            .field("pending", &self.is_pending())
            .field("dropped", &self.rx.dropped())
            .finish()
    }
}
