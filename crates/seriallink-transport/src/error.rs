use std::time::Duration;

/// Errors that can occur while writing to a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The write did not complete within the allowed time.
    #[error("transport write timed out after {0:?}")]
    Timeout(Duration),

    /// The stream accepted zero bytes; the peer is gone.
    #[error("transport closed")]
    Closed,

    /// The transport refused the write (used by test transports to simulate faults).
    #[error("transport rejected write: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
