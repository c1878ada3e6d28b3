//! ASCII command framing for serial links.
//!
//! Every message travels as a printable frame:
//! - `{` start, `}` end
//! - command (≤16 bytes) and data (≤64 bytes) separated by `:`
//! - a two-digit hex sequence number after `#`
//! - a two-digit hex CRC-8 (poly 0x07) over `CMD:DATA#SEQ` after the second `#`
//!
//! The parser consumes one byte at a time and never allocates, so it can sit
//! directly behind a receive interrupt or a reader thread.

pub mod codec;
pub mod control;
pub mod crc;
pub mod error;
pub mod parser;
pub mod sequence;

pub use codec::{
    content_checksum, encode_ack, encode_frame, encode_nak, validate_command, validate_fields,
    Frame, MAX_CMD_LEN, MAX_DATA_LEN, MAX_FRAME_LEN, RX_BUFFER_SIZE, TX_BUFFER_SIZE,
};
pub use control::{NakReason, ACK, CONTROL_SEQUENCE, NAK, PING, PING_DATA, PONG};
pub use error::{FrameError, Result};
pub use parser::{decode_frame, FrameParser, ParseState, FRAME_TIMEOUT};
pub use sequence::{accept_rx_sequence, SequenceVerdict, TxSequence, ACCEPT_WINDOW};
