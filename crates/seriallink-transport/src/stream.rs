use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Pause between retries when the stream reports `WouldBlock`.
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(1);

/// Transport over any [`Write`] stream.
///
/// Works with a serial device node opened as a file (line settings are the
/// caller's business), a pipe, or a socket. Set the stream non-blocking if
/// the timeout must be honored while the peer is stalled; a blocking stream
/// is only checked against the deadline between writes.
pub struct StreamTransport<W> {
    inner: W,
}

impl<W: Write + Send> StreamTransport<W> {
    /// Wrap a writable stream.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn flush(&mut self, deadline: Instant, timeout: Duration) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout(timeout));
                    }
                    std::thread::sleep(WOULD_BLOCK_BACKOFF);
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<W: Write + Send> Transport for StreamTransport<W> {
    fn send(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    trace!(written = offset, total = bytes.len(), "stream would block");
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout(timeout));
                    }
                    std::thread::sleep(WOULD_BLOCK_BACKOFF);
                    continue;
                }
                Err(err) => return Err(TransportError::Io(err)),
            }

            if offset < bytes.len() && Instant::now() >= deadline {
                return Err(TransportError::Timeout(timeout));
            }
        }

        self.flush(deadline, timeout)
    }
}

impl<W> std::fmt::Debug for StreamTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport").finish_non_exhaustive()
    }
}
