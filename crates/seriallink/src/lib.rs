//! Reliable framed command/response channels over serial links.
//!
//! seriallink turns any byte stream (a UART, a USB CDC port, a pipe) into
//! acknowledged command channels: printable `{CMD:DATA#SEQ#CRC}` frames,
//! CRC-8 integrity checks, duplicate and loss detection, bounded retries and
//! command-keyed dispatch.
//!
//! # Crate Structure
//!
//! - [`transport`]: transport and clock traits, stream and in-memory transports
//! - [`frame`]: CRC engine, frame codec, byte-wise parser, sequence manager
//! - [`channel`]: channels, the [`channel::Link`] registry, retry engine and dispatch

/// Re-export transport types.
pub mod transport {
    pub use seriallink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use seriallink_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use seriallink_channel::*;
}
