use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::control::{is_control, ACK, CONTROL_SEQUENCE, NAK};
use crate::crc::{self, Crc8Digest};
use crate::error::{FrameError, Result};

/// Frame start delimiter.
pub const FRAME_START: u8 = b'{';
/// Frame end delimiter.
pub const FRAME_END: u8 = b'}';
/// Separator between command and data.
pub const CMD_DATA_SEPARATOR: u8 = b':';
/// Separator after data and after the sequence.
pub const FIELD_SEPARATOR: u8 = b'#';

/// Maximum command length in bytes.
pub const MAX_CMD_LEN: usize = 16;
/// Maximum data length in bytes.
pub const MAX_DATA_LEN: usize = 64;
/// Transmit buffer size; no encoded frame may exceed it.
pub const TX_BUFFER_SIZE: usize = 128;
/// Receive buffer size of a channel.
pub const RX_BUFFER_SIZE: usize = 256;

/// Fixed overhead: start, separator, separator, 2 seq digits, separator, 2 crc digits, end.
const FRAME_OVERHEAD: usize = 9;

/// Longest frame the grammar allows.
pub const MAX_FRAME_LEN: usize = FRAME_OVERHEAD + MAX_CMD_LEN + MAX_DATA_LEN;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

pub type CommandField = heapless::String<MAX_CMD_LEN>;
pub type DataField = heapless::String<MAX_DATA_LEN>;

/// One wire frame: `{CMD:DATA#SEQ#CRC}`.
///
/// ```text
/// ┌───┬─────────┬───┬──────────┬───┬──────────┬───┬──────────┬───┐
/// │ { │ CMD     │ : │ DATA     │ # │ SEQ      │ # │ CRC      │ } │
/// │   │ ≤16 B   │   │ ≤64 B    │   │ 2 hex    │   │ 2 hex    │   │
/// └───┴─────────┴───┴──────────┴───┴──────────┴───┴──────────┴───┘
/// ```
///
/// The CRC covers `CMD:DATA#SEQ`, i.e. everything between `{` and the
/// second `#`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Command name.
    pub command: CommandField,
    /// Command argument.
    pub data: DataField,
    /// Sequence number as sent (0 for control frames).
    pub sequence: u8,
    /// Checksum as sent on the wire.
    pub checksum: u8,
    /// True when `checksum` matches the content.
    pub valid: bool,
}

impl Frame {
    /// Build a valid frame with its checksum filled in.
    pub fn new(command: &str, data: &str, sequence: u8) -> Result<Self> {
        validate_fields(command, data)?;

        let mut frame = Frame {
            sequence,
            ..Frame::default()
        };
        frame
            .command
            .push_str(command)
            .map_err(|()| FrameError::CommandTooLong {
                len: command.len(),
                max: MAX_CMD_LEN,
            })?;
        frame
            .data
            .push_str(data)
            .map_err(|()| FrameError::DataTooLong {
                len: data.len(),
                max: MAX_DATA_LEN,
            })?;
        frame.checksum = content_checksum(command, data, sequence);
        frame.valid = true;
        Ok(frame)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// True for `ACK` and `NAK`.
    pub fn is_control(&self) -> bool {
        is_control(&self.command)
    }

    /// Sequence referenced by a control frame's data field.
    pub fn target_sequence(&self) -> Option<u8> {
        let digits = self.data.as_bytes();
        if digits.len() != 2 || !digits.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        u8::from_str_radix(&self.data, 16).ok()
    }

    /// Encoded size on the wire.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.command.len() + self.data.len()
    }

    /// Append this frame to `dst`, recomputing the checksum.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<usize> {
        encode_frame(&self.command, &self.data, self.sequence, dst)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}:{}#{:02X}#{:02X}}}",
            self.command, self.data, self.sequence, self.checksum
        )
    }
}

/// True for the four delimiter bytes that may not appear inside a field.
pub fn is_reserved(byte: u8) -> bool {
    matches!(
        byte,
        FRAME_START | FRAME_END | CMD_DATA_SEPARATOR | FIELD_SEPARATOR
    )
}

/// Check command and data against the length limits and character rules.
pub fn validate_fields(command: &str, data: &str) -> Result<()> {
    if command.len() > MAX_CMD_LEN {
        return Err(FrameError::CommandTooLong {
            len: command.len(),
            max: MAX_CMD_LEN,
        });
    }
    if data.len() > MAX_DATA_LEN {
        return Err(FrameError::DataTooLong {
            len: data.len(),
            max: MAX_DATA_LEN,
        });
    }
    for ch in command.chars().chain(data.chars()) {
        if !ch.is_ascii() {
            return Err(FrameError::NonAscii(ch));
        }
        if is_reserved(ch as u8) {
            return Err(FrameError::ReservedCharacter(ch));
        }
    }
    Ok(())
}

/// Like [`validate_fields`], but also refuses the control names.
///
/// Used wherever a caller supplies an application command to send or handle.
pub fn validate_command(command: &str, data: &str) -> Result<()> {
    if is_control(command) {
        return Err(FrameError::ReservedCommand(command.to_string()));
    }
    validate_fields(command, data)
}

/// Two uppercase hex digits for `value`.
pub fn hex_pair(value: u8) -> [u8; 2] {
    [
        HEX_DIGITS[usize::from(value >> 4)],
        HEX_DIGITS[usize::from(value & 0x0F)],
    ]
}

/// Checksum of the canonical content `cmd:data#SS`.
pub fn content_checksum(command: &str, data: &str, sequence: u8) -> u8 {
    let mut digest = Crc8Digest::new();
    digest.update(command.as_bytes());
    digest.update(&[CMD_DATA_SEPARATOR]);
    digest.update(data.as_bytes());
    digest.update(&[FIELD_SEPARATOR]);
    digest.update(&hex_pair(sequence));
    digest.finish()
}

/// Encode a command frame into `dst`.
///
/// Returns the number of bytes appended.
pub fn encode_frame(command: &str, data: &str, sequence: u8, dst: &mut BytesMut) -> Result<usize> {
    validate_fields(command, data)?;
    put_frame(command.as_bytes(), data.as_bytes(), sequence, dst)
}

/// Encode an `ACK` for `target` into `dst`.
pub fn encode_ack(target: u8, dst: &mut BytesMut) -> Result<usize> {
    put_frame(ACK.as_bytes(), &hex_pair(target), CONTROL_SEQUENCE, dst)
}

/// Encode a `NAK` for `target` into `dst`.
pub fn encode_nak(target: u8, dst: &mut BytesMut) -> Result<usize> {
    put_frame(NAK.as_bytes(), &hex_pair(target), CONTROL_SEQUENCE, dst)
}

fn put_frame(command: &[u8], data: &[u8], sequence: u8, dst: &mut BytesMut) -> Result<usize> {
    let size = FRAME_OVERHEAD + command.len() + data.len();
    if size > TX_BUFFER_SIZE {
        return Err(FrameError::BufferOverflow {
            size,
            max: TX_BUFFER_SIZE,
        });
    }

    let start = dst.len();
    dst.reserve(size);
    dst.put_u8(FRAME_START);
    dst.put_slice(command);
    dst.put_u8(CMD_DATA_SEPARATOR);
    dst.put_slice(data);
    dst.put_u8(FIELD_SEPARATOR);
    dst.put_slice(&hex_pair(sequence));

    let checksum = crc::compute(&dst[start + 1..]);

    dst.put_u8(FIELD_SEPARATOR);
    dst.put_slice(&hex_pair(checksum));
    dst.put_u8(FRAME_END);
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{PING, PING_DATA};
    use crate::parser::decode_frame;

    fn encoded(command: &str, data: &str, sequence: u8) -> String {
        let mut buf = BytesMut::new();
        encode_frame(command, data, sequence, &mut buf).unwrap();
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn encodes_wire_grammar() {
        let wire = encoded("GET", "TEMP", 1);
        let crc = crc::compute(b"GET:TEMP#01");
        assert_eq!(wire, format!("{{GET:TEMP#01#{crc:02X}}}"));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let len = encode_frame("SET", "LED=1", 0x2A, &mut buf).unwrap();
        assert_eq!(len, buf.len());

        let frame = decode_frame(&buf).unwrap();
        assert_eq!(frame.command(), "SET");
        assert_eq!(frame.data(), "LED=1");
        assert_eq!(frame.sequence, 0x2A);
        assert!(frame.valid);
    }

    #[test]
    fn sequence_is_uppercase_hex() {
        let wire = encoded("X", "", 0xAB);
        assert!(wire.starts_with("{X:#AB#"));
    }

    #[test]
    fn ack_uses_fixed_sequence() {
        let mut buf = BytesMut::new();
        encode_ack(0x07, &mut buf).unwrap();
        let crc = crc::compute(b"ACK:07#00");
        assert_eq!(buf.as_ref(), format!("{{ACK:07#00#{crc:02X}}}").as_bytes());
    }

    #[test]
    fn nak_carries_target_only() {
        let mut buf = BytesMut::new();
        encode_nak(0x10, &mut buf).unwrap();
        let frame = decode_frame(&buf).unwrap();
        assert_eq!(frame.command(), NAK);
        assert_eq!(frame.target_sequence(), Some(0x10));
        assert_eq!(frame.sequence, CONTROL_SEQUENCE);
        assert!(frame.valid);
    }

    #[test]
    fn rejects_long_command() {
        let mut buf = BytesMut::new();
        let err = encode_frame("ABCDEFGHIJKLMNOPQ", "", 1, &mut buf).unwrap_err();
        assert_eq!(err, FrameError::CommandTooLong { len: 17, max: 16 });
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_long_data() {
        let data = "x".repeat(MAX_DATA_LEN + 1);
        let mut buf = BytesMut::new();
        let err = encode_frame("SET", &data, 1, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::DataTooLong { len: 65, .. }));
    }

    #[test]
    fn accepts_fields_at_limit() {
        let command = "C".repeat(MAX_CMD_LEN);
        let data = "d".repeat(MAX_DATA_LEN);
        let wire = encoded(&command, &data, 0xFF);
        assert_eq!(wire.len(), MAX_FRAME_LEN);
        assert!(MAX_FRAME_LEN <= TX_BUFFER_SIZE);
    }

    #[test]
    fn rejects_reserved_characters() {
        for bad in ["a:b", "a#b", "{", "}"] {
            let err = validate_fields("SET", bad).unwrap_err();
            assert!(matches!(err, FrameError::ReservedCharacter(_)), "{bad}");
        }
        let err = validate_fields("G:T", "").unwrap_err();
        assert_eq!(err, FrameError::ReservedCharacter(':'));
    }

    #[test]
    fn rejects_non_ascii() {
        let err = validate_fields("SET", "température").unwrap_err();
        assert_eq!(err, FrameError::NonAscii('é'));
    }

    #[test]
    fn frame_new_fills_checksum() {
        let frame = Frame::new("GET", "TEMP", 1).unwrap();
        assert_eq!(frame.checksum, crc::compute(b"GET:TEMP#01"));
        assert!(frame.valid);
        assert_eq!(frame.wire_size(), "{GET:TEMP#01#00}".len());

        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), frame.to_string().as_bytes());
    }

    #[test]
    fn target_sequence_requires_hex() {
        let frame = Frame::new("ACK", "zz", 0).unwrap();
        assert_eq!(frame.target_sequence(), None);
        let frame = Frame::new("ACK", "", 0).unwrap();
        assert_eq!(frame.target_sequence(), None);
        let frame = Frame::new("ACK", "0a", 0).unwrap();
        assert_eq!(frame.target_sequence(), Some(10));
    }

    #[test]
    fn target_sequence_requires_two_digits() {
        for data in ["+1", "1", "-1", "001", " 1"] {
            let frame = Frame::new("ACK", data, 0).unwrap();
            assert_eq!(frame.target_sequence(), None, "{data:?}");
        }
    }

    #[test]
    fn validate_command_rejects_control_names() {
        for name in [ACK, NAK] {
            let err = validate_command(name, "05").unwrap_err();
            assert_eq!(err, FrameError::ReservedCommand(name.to_string()));
        }
        assert!(validate_command(PING, PING_DATA).is_ok());
        assert!(matches!(
            validate_command("G:T", ""),
            Err(FrameError::ReservedCharacter(':'))
        ));
    }
}
