use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

#[derive(Debug, Default)]
struct MemoryState {
    sent: VecDeque<Vec<u8>>,
    fast_path: bool,
    fail_next: usize,
    fast_writes: usize,
    blocking_writes: usize,
}

/// In-memory transport that records every frame written to it.
///
/// A [`MemoryHandle`] obtained from [`MemoryTransport::handle`] observes the
/// same state after the transport itself has been moved into a channel.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

/// Inspection and fault-injection side of a [`MemoryTransport`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    /// Create a transport that accepts everything on the blocking path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport together with its inspection handle.
    pub fn with_handle() -> (Self, MemoryHandle) {
        let transport = Self::new();
        let handle = transport.handle();
        (transport, handle)
    }

    /// Handle sharing this transport's state.
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn try_send(&mut self, bytes: &[u8]) -> Result<bool> {
        let mut state = self.lock();
        if !state.fast_path || state.fail_next > 0 {
            return Ok(false);
        }
        state.fast_writes += 1;
        state.sent.push_back(bytes.to_vec());
        trace!(len = bytes.len(), "memory transport fast write");
        Ok(true)
    }

    fn send(&mut self, bytes: &[u8], _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(TransportError::Rejected("injected failure".to_string()));
        }
        state.blocking_writes += 1;
        state.sent.push_back(bytes.to_vec());
        trace!(len = bytes.len(), "memory transport blocking write");
        Ok(())
    }
}

impl MemoryHandle {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every frame written so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.iter().cloned().collect()
    }

    /// Remove and return every frame written so far.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.drain(..).collect()
    }

    /// Remove and return the oldest frame.
    pub fn pop_sent(&self) -> Option<Vec<u8>> {
        self.lock().sent.pop_front()
    }

    /// Number of frames currently recorded.
    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Let [`Transport::try_send`] accept writes.
    pub fn set_fast_path(&self, enabled: bool) {
        self.lock().fast_path = enabled;
    }

    /// Make the next `count` blocking writes fail.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Writes accepted by the fast path.
    pub fn fast_writes(&self) -> usize {
        self.lock().fast_writes
    }

    /// Writes accepted by the blocking path.
    pub fn blocking_writes(&self) -> usize {
        self.lock().blocking_writes
    }
}
