use std::time::Duration;

use tracing::trace;

use crate::codec::{
    content_checksum, is_reserved, Frame, CMD_DATA_SEPARATOR, FIELD_SEPARATOR, FRAME_END,
    FRAME_START,
};
use crate::error::{FrameError, Result};

/// Default time allowed between a start byte and the matching end byte.
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(100);

/// Where the parser is inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseState {
    /// Waiting for `{`.
    #[default]
    Idle,
    /// Reading the command, up to `:`.
    Cmd,
    /// Reading the data, up to `#`.
    Data,
    /// Reading two sequence digits, up to `#`.
    Seq,
    /// Reading two checksum digits, up to `}`.
    Crc,
}

impl ParseState {
    pub fn label(self) -> &'static str {
        match self {
            ParseState::Idle => "IDLE",
            ParseState::Cmd => "CMD",
            ParseState::Data => "DATA",
            ParseState::Seq => "SEQ",
            ParseState::Crc => "CRC",
        }
    }
}

/// Byte-at-a-time frame parser.
///
/// Cheap enough to run from a receive interrupt or reader thread: no
/// allocation, no I/O. Malformed input silently drops back to
/// [`ParseState::Idle`]; the frame was never validated so nobody is told.
/// A complete frame is returned with `valid` set from the checksum
/// comparison, whether or not it matched.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    frame: Frame,
    digits: heapless::Vec<u8, 2>,
    frame_timeout_ms: u64,
    deadline: Option<u64>,
}

impl FrameParser {
    /// Parser with the default frame-assembly timeout.
    pub fn new() -> Self {
        Self::with_timeout(FRAME_TIMEOUT)
    }

    /// Parser with an explicit frame-assembly timeout.
    pub fn with_timeout(frame_timeout: Duration) -> Self {
        Self {
            state: ParseState::Idle,
            frame: Frame::default(),
            digits: heapless::Vec::new(),
            frame_timeout_ms: u64::try_from(frame_timeout.as_millis()).unwrap_or(u64::MAX),
            deadline: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Frame-assembly deadline, armed while a frame is in progress.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// True when a frame has been in progress past its deadline.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.state != ParseState::Idle && self.deadline.is_some_and(|d| now_ms >= d)
    }

    /// Abandon any partial frame.
    pub fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.digits.clear();
        self.deadline = None;
    }

    /// Feed one byte. Returns the frame when `byte` completes one.
    pub fn push(&mut self, byte: u8, now_ms: u64) -> Option<Frame> {
        if byte == FRAME_START {
            if self.state != ParseState::Idle {
                trace!(state = self.state.label(), "start byte mid-frame, restarting");
            }
            self.begin(now_ms);
            return None;
        }

        match self.state {
            ParseState::Idle => None,
            ParseState::Cmd => {
                if byte == CMD_DATA_SEPARATOR {
                    self.state = ParseState::Data;
                } else if !is_field_byte(byte) {
                    self.abort("unexpected byte in command");
                } else if self.frame.command.push(char::from(byte)).is_err() {
                    self.abort("command too long");
                }
                None
            }
            ParseState::Data => {
                if byte == FIELD_SEPARATOR {
                    self.digits.clear();
                    self.state = ParseState::Seq;
                } else if !is_field_byte(byte) {
                    self.abort("unexpected byte in data");
                } else if self.frame.data.push(char::from(byte)).is_err() {
                    self.abort("data too long");
                }
                None
            }
            ParseState::Seq => {
                if byte == FIELD_SEPARATOR {
                    match self.take_hex() {
                        Some(sequence) => {
                            self.frame.sequence = sequence;
                            self.state = ParseState::Crc;
                        }
                        None => self.abort("sequence must be two hex digits"),
                    }
                } else {
                    self.push_digit(byte, "bad sequence digit");
                }
                None
            }
            ParseState::Crc => {
                if byte == FRAME_END {
                    match self.take_hex() {
                        Some(checksum) => return Some(self.complete(checksum)),
                        None => self.abort("checksum must be two hex digits"),
                    }
                } else {
                    self.push_digit(byte, "bad checksum digit");
                }
                None
            }
        }
    }

    fn begin(&mut self, now_ms: u64) {
        self.frame = Frame::default();
        self.digits.clear();
        self.state = ParseState::Cmd;
        self.deadline = Some(now_ms.saturating_add(self.frame_timeout_ms));
    }

    fn abort(&mut self, reason: &'static str) {
        trace!(state = self.state.label(), reason, "frame aborted");
        self.reset();
    }

    fn push_digit(&mut self, byte: u8, reason: &'static str) {
        if hex_value(byte).is_none() || self.digits.push(byte).is_err() {
            self.abort(reason);
        }
    }

    fn take_hex(&mut self) -> Option<u8> {
        let value = match self.digits.as_slice() {
            [hi, lo] => Some((hex_value(*hi)? << 4) | hex_value(*lo)?),
            _ => None,
        };
        self.digits.clear();
        value
    }

    fn complete(&mut self, checksum: u8) -> Frame {
        let mut frame = std::mem::take(&mut self.frame);
        frame.checksum = checksum;
        frame.valid = checksum == content_checksum(&frame.command, &frame.data, frame.sequence);
        trace!(frame = %frame, valid = frame.valid, "frame complete");
        self.reset();
        frame
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_field_byte(byte: u8) -> bool {
    byte.is_ascii() && !is_reserved(byte)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Run a fresh parser over `bytes` and return the first frame it completes.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    let mut parser = FrameParser::new();
    bytes
        .iter()
        .find_map(|&byte| parser.push(byte, 0))
        .ok_or(FrameError::Incomplete)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, MAX_CMD_LEN, MAX_DATA_LEN};
    use crate::crc;

    fn feed(parser: &mut FrameParser, bytes: &[u8], now_ms: u64) -> Vec<Frame> {
        bytes
            .iter()
            .filter_map(|&b| parser.push(b, now_ms))
            .collect()
    }

    fn wire(command: &str, data: &str, sequence: u8) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(command, data, sequence, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn parses_valid_frame() {
        let mut parser = FrameParser::new();
        let frames = feed(&mut parser, &wire("GET", "TEMP", 1), 0);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command(), "GET");
        assert_eq!(frames[0].data(), "TEMP");
        assert_eq!(frames[0].sequence, 1);
        assert!(frames[0].valid);
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn walks_through_states() {
        let mut parser = FrameParser::new();
        let expected = [
            (b'{', ParseState::Cmd),
            (b'A', ParseState::Cmd),
            (b':', ParseState::Data),
            (b'b', ParseState::Data),
            (b'#', ParseState::Seq),
            (b'0', ParseState::Seq),
            (b'1', ParseState::Seq),
            (b'#', ParseState::Crc),
            (b'F', ParseState::Crc),
        ];
        for (byte, state) in expected {
            assert!(parser.push(byte, 0).is_none());
            assert_eq!(parser.state(), state, "after {:?}", char::from(byte));
        }
    }

    #[test]
    fn bad_checksum_still_completes_invalid() {
        let mut parser = FrameParser::new();
        let good = crc::compute(b"GET:TEMP#01");
        let bad = format!("{{GET:TEMP#01#{:02X}}}", good ^ 0x01);
        let frames = feed(&mut parser, bad.as_bytes(), 0);

        assert_eq!(frames.len(), 1);
        assert!(!frames[0].valid);
        assert_eq!(frames[0].checksum, good ^ 0x01);
    }

    #[test]
    fn lowercase_hex_accepted() {
        let crc = crc::compute(b"X:y#AB");
        let text = format!("{{X:y#ab#{crc:02x}}}");
        let frame = decode_frame(text.as_bytes()).unwrap();
        assert_eq!(frame.sequence, 0xAB);
        assert!(frame.valid);
    }

    #[test]
    fn noise_before_start_is_ignored() {
        let mut bytes = b"garbage}#:".to_vec();
        bytes.extend(wire("PING", "TEST", 3));
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!(frame.command(), "PING");
    }

    #[test]
    fn overlong_command_aborts() {
        let mut parser = FrameParser::new();
        let mut bytes = vec![b'{'];
        bytes.extend(std::iter::repeat(b'C').take(MAX_CMD_LEN + 1));
        assert!(feed(&mut parser, &bytes, 0).is_empty());
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn command_at_limit_is_kept() {
        let command = "C".repeat(MAX_CMD_LEN);
        let frame = decode_frame(&wire(&command, "", 1)).unwrap();
        assert_eq!(frame.command(), command);
    }

    #[test]
    fn overlong_data_aborts() {
        let mut parser = FrameParser::new();
        let mut bytes = b"{SET:".to_vec();
        bytes.extend(std::iter::repeat(b'd').take(MAX_DATA_LEN + 1));
        bytes.extend_from_slice(b"#01#00}");
        assert!(feed(&mut parser, &bytes, 0).is_empty());
    }

    #[test]
    fn three_digit_sequence_aborts() {
        assert_eq!(
            decode_frame(b"{A:b#001#00}").unwrap_err(),
            FrameError::Incomplete
        );
    }

    #[test]
    fn one_digit_checksum_aborts() {
        assert_eq!(
            decode_frame(b"{A:b#01#0}").unwrap_err(),
            FrameError::Incomplete
        );
    }

    #[test]
    fn non_hex_sequence_aborts() {
        assert!(decode_frame(b"{A:b#0G#00}").is_err());
    }

    #[test]
    fn misplaced_delimiter_aborts() {
        assert!(decode_frame(b"{A:b:c#01#00}").is_err());
        assert!(decode_frame(b"{A}b#01#00}").is_err());
    }

    #[test]
    fn non_ascii_aborts() {
        let mut parser = FrameParser::new();
        assert!(feed(&mut parser, b"{A:\xC3\xA9", 0).is_empty());
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn start_byte_restarts_assembly() {
        let mut bytes = b"{BROKEN:par".to_vec();
        bytes.extend(wire("GET", "TEMP", 9));
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!(frame.command(), "GET");
        assert_eq!(frame.sequence, 9);
        assert!(frame.valid);
    }

    #[test]
    fn start_byte_clears_previous_fields() {
        let mut parser = FrameParser::new();
        feed(&mut parser, b"{OLD:stale", 0);
        let frames = feed(&mut parser, &wire("NEW", "", 2), 0);
        assert_eq!(frames[0].command(), "NEW");
        assert_eq!(frames[0].data(), "");
    }

    #[test]
    fn deadline_armed_on_start() {
        let mut parser = FrameParser::with_timeout(Duration::from_millis(100));
        assert_eq!(parser.deadline(), None);
        assert!(!parser.is_expired(1_000));

        parser.push(b'{', 500);
        assert_eq!(parser.deadline(), Some(600));
        assert!(!parser.is_expired(599));
        assert!(parser.is_expired(600));

        parser.reset();
        assert!(!parser.is_expired(10_000));
        assert_eq!(parser.state(), ParseState::Idle);
    }

    #[test]
    fn consecutive_frames() {
        let mut parser = FrameParser::new();
        let mut bytes = wire("A", "1", 1);
        bytes.extend(wire("B", "2", 2));
        let frames = feed(&mut parser, &bytes, 0);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].command(), "B");
        assert_eq!(frames[1].sequence, 2);
    }

    #[test]
    fn empty_input_is_incomplete() {
        assert_eq!(decode_frame(b"").unwrap_err(), FrameError::Incomplete);
        assert_eq!(
            decode_frame(b"{GET:TEMP#01").unwrap_err(),
            FrameError::Incomplete
        );
    }
}
