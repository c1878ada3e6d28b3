/// Errors returned by channel and link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] seriallink_transport::TransportError),

    /// The command or data could not be framed.
    #[error("frame error: {0}")]
    Frame(#[from] seriallink_frame::FrameError),

    /// No channel is registered under this key.
    #[error("channel {0} not registered")]
    ChannelNotFound(String),

    /// Every channel slot is taken.
    #[error("channel registry full (max {0})")]
    RegistryFull(usize),

    /// Every handler slot on the channel is taken.
    #[error("handler table full on channel {channel} (max {max})")]
    HandlerTableFull { channel: String, max: usize },

    /// The channel is still waiting for an acknowledgement.
    #[error("channel {0} busy with an unacknowledged command")]
    Busy(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
