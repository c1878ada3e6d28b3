use serde::Serialize;

/// Running counters for one channel.
///
/// Kept across [`Link::reset_channel`](crate::Link::reset_channel).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Commands handed to [`Link::send`](crate::Link::send).
    pub tx_count: u64,
    /// Commands acknowledged.
    pub tx_success: u64,
    /// Commands that failed to transmit or ran out of retries.
    pub tx_failed: u64,
    /// Retransmissions, whether from a timeout or a NAK.
    pub tx_retry: u64,
    /// Acknowledgement deadlines that expired.
    pub tx_timeout: u64,

    /// Complete frames taken from the receive path.
    pub rx_count: u64,
    /// Commands accepted and acknowledged.
    pub rx_success: u64,
    /// Commands seen again with the last accepted sequence.
    pub rx_duplicate: u64,
    /// Frames discarded for a checksum mismatch.
    pub rx_crc_error: u64,
    /// Partial frames abandoned at the assembly deadline.
    pub rx_frame_timeout: u64,
    /// Commands answered with a NAK.
    pub rx_seq_error: u64,
    /// Bytes dropped while a decoded frame waited for the tick.
    pub rx_dropped_bytes: u64,

    /// Fastest acknowledgement seen, in milliseconds.
    pub min_delay_ms: Option<u64>,
    /// Slowest acknowledgement seen, in milliseconds.
    pub max_delay_ms: u64,
    /// Mean acknowledgement delay, in milliseconds.
    pub avg_delay_ms: u64,
    #[serde(skip)]
    delay_total_ms: u64,

    /// `PING` commands sent.
    pub ping_count: u64,
    /// `PING` commands acknowledged.
    pub ping_success: u64,
}

impl ChannelStats {
    pub(crate) fn record_delay(&mut self, delay_ms: u64) {
        self.delay_total_ms = self.delay_total_ms.saturating_add(delay_ms);
        self.max_delay_ms = self.max_delay_ms.max(delay_ms);
        self.min_delay_ms = Some(self.min_delay_ms.map_or(delay_ms, |m| m.min(delay_ms)));
        if self.tx_success > 0 {
            self.avg_delay_ms = self.delay_total_ms / self.tx_success;
        }
    }
}
