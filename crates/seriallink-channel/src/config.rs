use std::time::Duration;

use seriallink_frame::FRAME_TIMEOUT;

/// Default base acknowledgement wait.
pub const DEFAULT_ACK_TIMEOUT_BASE: Duration = Duration::from_millis(200);
/// Default extra acknowledgement wait per encoded byte.
pub const DEFAULT_ACK_TIMEOUT_PER_BYTE: Duration = Duration::from_millis(1);
/// Default number of retransmissions after the first send.
pub const DEFAULT_MAX_RETRY: u8 = 3;
/// Default blocking write timeout for commands.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default blocking write timeout for ACK/NAK.
pub const DEFAULT_CONTROL_SEND_TIMEOUT: Duration = Duration::from_millis(500);

/// Per-channel protocol timing and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Fixed part of the acknowledgement deadline.
    pub ack_timeout_base: Duration,
    /// Added to the deadline for every byte of the transmitted frame.
    pub ack_timeout_per_byte: Duration,
    /// Retransmissions attempted before the failure handler fires.
    pub max_retry: u8,
    /// Longest a partial incoming frame may stay open.
    pub frame_timeout: Duration,
    /// Blocking write timeout for commands and retransmissions.
    pub send_timeout: Duration,
    /// Blocking write timeout for ACK and NAK.
    pub control_send_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ack_timeout_base: DEFAULT_ACK_TIMEOUT_BASE,
            ack_timeout_per_byte: DEFAULT_ACK_TIMEOUT_PER_BYTE,
            max_retry: DEFAULT_MAX_RETRY,
            frame_timeout: FRAME_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            control_send_timeout: DEFAULT_CONTROL_SEND_TIMEOUT,
        }
    }
}

impl ChannelConfig {
    /// Acknowledgement wait for a frame of `frame_len` bytes.
    pub fn ack_timeout_for(&self, frame_len: usize) -> Duration {
        let bytes = u32::try_from(frame_len).unwrap_or(u32::MAX);
        self.ack_timeout_base
            .saturating_add(self.ack_timeout_per_byte.saturating_mul(bytes))
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_constants() {
        let config = ChannelConfig::default();
        assert_eq!(config.ack_timeout_base, Duration::from_millis(200));
        assert_eq!(config.max_retry, 3);
        assert_eq!(config.frame_timeout, Duration::from_millis(100));
        assert_eq!(config.send_timeout, Duration::from_millis(1000));
        assert_eq!(config.control_send_timeout, Duration::from_millis(500));
    }

    #[test]
    fn ack_timeout_scales_with_length() {
        let config = ChannelConfig::default();
        assert_eq!(config.ack_timeout_for(0), Duration::from_millis(200));
        assert_eq!(config.ack_timeout_for(16), Duration::from_millis(216));
    }
}
