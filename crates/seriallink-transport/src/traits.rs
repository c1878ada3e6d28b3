use std::time::Duration;

use crate::error::Result;

/// A byte-oriented outgoing link: a UART, a pipe, a socket.
///
/// Writes are always whole frames. Implementations must not block longer than
/// the timeout handed to [`Transport::send`].
pub trait Transport: Send {
    /// Non-blocking fast path.
    ///
    /// Returns `Ok(true)` when the whole buffer was accepted, `Ok(false)` when
    /// the transport cannot take it right now and the caller should fall back
    /// to [`Transport::send`]. The default never takes the fast path.
    fn try_send(&mut self, bytes: &[u8]) -> Result<bool> {
        let _ = bytes;
        Ok(false)
    }

    /// Write the whole buffer, blocking for at most `timeout`.
    fn send(&mut self, bytes: &[u8], timeout: Duration) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn try_send(&mut self, bytes: &[u8]) -> Result<bool> {
        (**self).try_send(bytes)
    }

    fn send(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        (**self).send(bytes, timeout)
    }
}

/// Monotonic millisecond clock.
///
/// Only differences between readings are meaningful.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}
