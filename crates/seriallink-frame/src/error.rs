/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The command string exceeds the wire limit.
    #[error("command too long ({len} bytes, max {max})")]
    CommandTooLong { len: usize, max: usize },

    /// The data string exceeds the wire limit.
    #[error("data too long ({len} bytes, max {max})")]
    DataTooLong { len: usize, max: usize },

    /// A field contains one of the frame delimiters `{ } : #`.
    #[error("field contains reserved frame character {0:?}")]
    ReservedCharacter(char),

    /// A field contains a byte outside printable-safe ASCII.
    #[error("field contains non-ASCII character {0:?}")]
    NonAscii(char),

    /// `ACK` and `NAK` are control names and cannot carry application commands.
    #[error("command {0:?} is reserved for control frames")]
    ReservedCommand(String),

    /// The encoded frame would not fit the transmit buffer.
    #[error("encoded frame too large ({size} bytes, max {max})")]
    BufferOverflow { size: usize, max: usize },

    /// The input ended (or was malformed) before a complete frame was seen.
    #[error("no complete frame in input")]
    Incomplete,
}

pub type Result<T> = std::result::Result<T, FrameError>;
