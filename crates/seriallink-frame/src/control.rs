//! Reserved command names.
//!
//! `ACK` and `NAK` are control frames: they carry the target sequence as two
//! hex digits in the data field, use the fixed sequence `00`, and never go
//! through sequence validation or handler dispatch. `PING`/`PONG` are plain
//! commands kept here so both ends agree on the spelling.

/// Positive acknowledgement.
pub const ACK: &str = "ACK";

/// Negative acknowledgement.
pub const NAK: &str = "NAK";

/// Liveness check.
pub const PING: &str = "PING";

/// Liveness reply.
pub const PONG: &str = "PONG";

/// Data sent with a liveness check.
pub const PING_DATA: &str = "TEST";

/// Sequence field value used by every control frame.
pub const CONTROL_SEQUENCE: u8 = 0;

/// Returns true for `ACK` and `NAK`.
pub fn is_control(command: &str) -> bool {
    command == ACK || command == NAK
}

/// Local-only explanation attached to an outgoing NAK.
///
/// The wire format has no room for it; peers only see the target sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NakReason {
    /// The incoming sequence regressed or jumped outside the window.
    SequenceError,
}

impl NakReason {
    pub fn as_str(self) -> &'static str {
        match self {
            NakReason::SequenceError => "SEQ_ERROR",
        }
    }
}

impl std::fmt::Display for NakReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
