use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use seriallink_frame::codec::{CommandField, DataField};
use seriallink_frame::{
    accept_rx_sequence, encode_ack, encode_frame, encode_nak, validate_command, Frame, NakReason,
    SequenceVerdict, TxSequence, ACK, NAK, PING, TX_BUFFER_SIZE,
};
use seriallink_transport::{Clock, Transport, TransportError};
use tracing::{debug, info, warn};

use crate::config::{millis, ChannelConfig};
use crate::error::{LinkError, Result};
use crate::handlers::{
    CommandHandler, FailReason, FailureHandler, HandlerTable, RegisterError, StateChangeHandler,
    MAX_HANDLERS,
};
use crate::rx::{ByteSink, RxPath};
use crate::state::TxState;
use crate::stats::ChannelStats;

/// Identity of the transport a channel is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey(String);

impl ChannelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ChannelKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The command currently awaiting acknowledgement.
#[derive(Debug, Clone)]
struct Outstanding {
    command: CommandField,
    data: DataField,
    sequence: u8,
}

impl Outstanding {
    fn new(command: &str, data: &str, sequence: u8) -> Option<Self> {
        let mut out = Outstanding {
            command: CommandField::new(),
            data: DataField::new(),
            sequence,
        };
        out.command.push_str(command).ok()?;
        out.data.push_str(data).ok()?;
        Some(out)
    }
}

/// Protocol state bound to one transport.
///
/// A channel allows one unacknowledged command at a time. All protocol work
/// happens in [`Channel::tick`]; received bytes only reach it through the
/// [`ByteSink`] handoff.
pub struct Channel {
    key: ChannelKey,
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: ChannelConfig,
    rx: Arc<RxPath>,

    state: TxState,
    tx_sequence: TxSequence,
    rx_sequence: u8,
    expected_ack_seq: u8,
    retry_count: u8,
    ack_deadline: Option<u64>,
    sent_at: u64,
    tx_buffer: BytesMut,
    control_buffer: BytesMut,
    outstanding: Option<Outstanding>,

    handlers: HandlerTable,
    on_failure: Option<FailureHandler>,
    on_state_change: Option<StateChangeHandler>,
    stats: ChannelStats,
}

impl Channel {
    pub(crate) fn new(
        key: ChannelKey,
        transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            key,
            transport,
            clock,
            rx: Arc::new(RxPath::new(config.frame_timeout)),
            config,
            state: TxState::Idle,
            tx_sequence: TxSequence::new(),
            rx_sequence: 0,
            expected_ack_seq: 0,
            retry_count: 0,
            ack_deadline: None,
            sent_at: 0,
            tx_buffer: BytesMut::with_capacity(TX_BUFFER_SIZE),
            control_buffer: BytesMut::with_capacity(TX_BUFFER_SIZE),
            outstanding: None,
            handlers: HandlerTable::new(),
            on_failure: None,
            on_state_change: None,
            stats: ChannelStats::default(),
        }
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// True when a new command may be sent.
    pub fn is_ready(&self) -> bool {
        self.state == TxState::Idle
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    /// Sequence the channel is waiting to see acknowledged.
    pub fn expected_ack_seq(&self) -> u8 {
        self.expected_ack_seq
    }

    /// Last accepted incoming sequence.
    pub fn rx_sequence(&self) -> u8 {
        self.rx_sequence
    }

    /// Snapshot of the channel counters.
    pub fn stats(&self) -> ChannelStats {
        let mut stats = self.stats.clone();
        stats.rx_dropped_bytes = self.rx.dropped();
        stats
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// New producer handle for this channel's receive path.
    pub fn byte_sink(&self) -> ByteSink {
        ByteSink::new(Arc::clone(&self.rx), Arc::clone(&self.clock))
    }

    pub(crate) fn on_command(&mut self, command: &str, handler: CommandHandler) -> Result<()> {
        self.handlers
            .register(command, handler)
            .map_err(|err| match err {
                RegisterError::Invalid(err) => LinkError::Frame(err),
                RegisterError::Full => LinkError::HandlerTableFull {
                    channel: self.key.to_string(),
                    max: MAX_HANDLERS,
                },
            })
    }

    pub(crate) fn on_failure(&mut self, handler: FailureHandler) {
        self.on_failure = Some(handler);
    }

    pub(crate) fn on_state_change(&mut self, handler: StateChangeHandler) {
        self.on_state_change = Some(handler);
    }

    /// Send a command and start waiting for its acknowledgement.
    ///
    /// The channel only enters [`TxState::WaitAck`] once the transport has
    /// taken the frame. A failed write leaves it idle.
    pub fn send(&mut self, command: &str, data: &str) -> Result<()> {
        if self.state != TxState::Idle {
            return Err(LinkError::Busy(self.key.to_string()));
        }
        validate_command(command, data)?;

        self.retry_count = 0;
        self.stats.tx_count += 1;
        let (len, sequence) = self.build_command_frame(command, data)?;

        if let Err(err) = write_frame(
            self.transport.as_mut(),
            &self.tx_buffer,
            self.config.send_timeout,
        ) {
            self.stats.tx_failed += 1;
            warn!(channel = %self.key, seq = sequence, error = %err, "command transmit failed");
            return Err(err.into());
        }

        let now = self.clock.now_ms();
        self.outstanding = Outstanding::new(command, data, sequence);
        self.sent_at = now;
        self.ack_deadline = Some(self.deadline_for(now, len));
        if command == PING {
            self.stats.ping_count += 1;
        }
        debug!(channel = %self.key, command, seq = sequence, "command sent");
        self.set_state(TxState::WaitAck);
        Ok(())
    }

    /// Run one round of protocol work: ack deadline, frame deadline, then
    /// the pending received frame.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();

        if self.state == TxState::WaitAck && self.ack_deadline.is_some_and(|d| now >= d) {
            self.stats.tx_timeout += 1;
            debug!(channel = %self.key, seq = self.expected_ack_seq, "ack deadline passed");
            self.retry_or_fail(now);
        }

        if self.rx.expire_stale(now) {
            self.stats.rx_frame_timeout += 1;
            debug!(channel = %self.key, "partial frame timed out");
        }

        if let Some(frame) = self.rx.take() {
            self.handle_frame(&frame, now);
        }
    }

    /// Return to power-on protocol state, keeping config, handlers and stats.
    pub fn reset(&mut self) {
        self.state = TxState::Idle;
        self.tx_sequence = TxSequence::new();
        self.rx_sequence = 0;
        self.expected_ack_seq = 0;
        self.retry_count = 0;
        self.ack_deadline = None;
        self.sent_at = 0;
        self.outstanding = None;
        self.tx_buffer.clear();
        self.control_buffer.clear();
        self.rx.clear();
        info!(channel = %self.key, "channel reset");
    }

    /// Encode a command into the transmit buffer.
    ///
    /// Retransmissions reuse the outstanding sequence; anything else takes
    /// the next one. Sets the expected acknowledgement to the sequence used.
    fn build_command_frame(&mut self, command: &str, data: &str) -> Result<(usize, u8)> {
        let sequence = match &self.outstanding {
            Some(out) if self.retry_count > 0 => out.sequence,
            _ => self.tx_sequence.next_tx_sequence(),
        };
        self.tx_buffer.clear();
        let len = encode_frame(command, data, sequence, &mut self.tx_buffer)?;
        self.expected_ack_seq = sequence;
        Ok((len, sequence))
    }

    fn deadline_for(&self, now: u64, frame_len: usize) -> u64 {
        now.saturating_add(millis(self.config.ack_timeout_for(frame_len)))
    }

    /// Timeout and NAK path: retransmit while attempts remain, otherwise give up.
    fn retry_or_fail(&mut self, now: u64) {
        let Some(out) = self.outstanding.clone() else {
            self.finish_transaction();
            return;
        };

        if self.retry_count < self.config.max_retry {
            self.retry_count += 1;
            self.stats.tx_retry += 1;
            debug!(
                channel = %self.key,
                seq = out.sequence,
                retry = self.retry_count,
                "retransmitting"
            );

            let len = match self.build_command_frame(&out.command, &out.data) {
                Ok((len, _)) => {
                    if let Err(err) = write_frame(
                        self.transport.as_mut(),
                        &self.tx_buffer,
                        self.config.send_timeout,
                    ) {
                        warn!(channel = %self.key, seq = out.sequence, error = %err, "retransmit failed");
                    }
                    len
                }
                Err(err) => {
                    warn!(channel = %self.key, error = %err, "could not rebuild command frame");
                    0
                }
            };
            self.sent_at = now;
            self.ack_deadline = Some(self.deadline_for(now, len));
            return;
        }

        self.stats.tx_failed += 1;
        warn!(
            channel = %self.key,
            command = %out.command,
            seq = out.sequence,
            retries = self.retry_count,
            "retries exhausted"
        );
        if let Some(handler) = self.on_failure.as_mut() {
            handler(&out.command, &out.data, FailReason::Timeout);
        }
        self.finish_transaction();
    }

    fn finish_transaction(&mut self) {
        self.ack_deadline = None;
        self.outstanding = None;
        self.set_state(TxState::Idle);
        self.retry_count = 0;
    }

    fn handle_frame(&mut self, frame: &Frame, now: u64) {
        self.stats.rx_count += 1;
        if !frame.valid {
            self.stats.rx_crc_error += 1;
            debug!(channel = %self.key, frame = %frame, "checksum mismatch, dropped");
            return;
        }

        match frame.command() {
            ACK => self.handle_ack(frame, now),
            NAK => self.handle_nak(frame, now),
            _ => self.dispatch_command(frame),
        }
    }

    fn awaiting(&self, target: Option<u8>) -> bool {
        self.state == TxState::WaitAck && target == Some(self.expected_ack_seq)
    }

    fn handle_ack(&mut self, frame: &Frame, now: u64) {
        let target = frame.target_sequence();
        if !self.awaiting(target) {
            debug!(channel = %self.key, ?target, "unexpected ack ignored");
            return;
        }

        let delay = now.saturating_sub(self.sent_at);
        let was_ping = self
            .outstanding
            .as_ref()
            .is_some_and(|out| out.command == PING);
        debug!(channel = %self.key, ?target, delay_ms = delay, "ack received");

        self.stats.tx_success += 1;
        self.stats.record_delay(delay);
        if was_ping {
            self.stats.ping_success += 1;
        }
        self.finish_transaction();
    }

    fn handle_nak(&mut self, frame: &Frame, now: u64) {
        let target = frame.target_sequence();
        if !self.awaiting(target) {
            debug!(channel = %self.key, ?target, "unexpected nak ignored");
            return;
        }
        debug!(channel = %self.key, ?target, "nak received");
        self.retry_or_fail(now);
    }

    fn dispatch_command(&mut self, frame: &Frame) {
        let sequence = frame.sequence;

        // Our own command reflected back (loopback wiring, echoing peer).
        if self.state == TxState::WaitAck && sequence == self.expected_ack_seq {
            debug!(channel = %self.key, seq = sequence, "own sequence seen, ignored");
            return;
        }

        match accept_rx_sequence(self.rx_sequence, sequence) {
            SequenceVerdict::Accept => {
                self.rx_sequence = sequence;
                self.stats.rx_success += 1;
                self.send_ack(sequence);
                match self.handlers.get_mut(frame.command()) {
                    Some(handler) => {
                        debug!(channel = %self.key, command = frame.command(), seq = sequence, "dispatching");
                        handler(frame.command(), frame.data());
                    }
                    None => {
                        debug!(channel = %self.key, command = frame.command(), "no handler registered");
                    }
                }
            }
            SequenceVerdict::Duplicate => {
                self.stats.rx_duplicate += 1;
                debug!(channel = %self.key, seq = sequence, "duplicate, re-acknowledging");
                self.send_ack(sequence);
            }
            verdict => {
                self.stats.rx_seq_error += 1;
                debug!(
                    channel = %self.key,
                    seq = sequence,
                    current = self.rx_sequence,
                    ?verdict,
                    "sequence rejected"
                );
                self.send_nak(sequence, NakReason::SequenceError);
            }
        }
    }

    fn send_ack(&mut self, target: u8) {
        self.control_buffer.clear();
        if let Err(err) = encode_ack(target, &mut self.control_buffer) {
            warn!(channel = %self.key, error = %err, "could not encode ack");
            return;
        }
        if let Err(err) = write_frame(
            self.transport.as_mut(),
            &self.control_buffer,
            self.config.control_send_timeout,
        ) {
            warn!(channel = %self.key, seq = target, error = %err, "ack transmit failed");
        }
    }

    fn send_nak(&mut self, target: u8, reason: NakReason) {
        self.control_buffer.clear();
        if let Err(err) = encode_nak(target, &mut self.control_buffer) {
            warn!(channel = %self.key, error = %err, "could not encode nak");
            return;
        }
        debug!(channel = %self.key, seq = target, %reason, "sending nak");
        if let Err(err) = write_frame(
            self.transport.as_mut(),
            &self.control_buffer,
            self.config.control_send_timeout,
        ) {
            warn!(channel = %self.key, seq = target, error = %err, "nak transmit failed");
        }
    }

    /// Change state and notify; no-op for self-transitions.
    fn set_state(&mut self, new: TxState) {
        let old = self.state;
        if old == new {
            return;
        }
        self.state = new;
        debug!(channel = %self.key, from = %old, to = %new, retry = self.retry_count, "state change");
        if let Some(handler) = self.on_state_change.as_mut() {
            handler(old, new, self.retry_count);
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("tx_sequence", &self.tx_sequence.last())
            .field("rx_sequence", &self.rx_sequence)
            .field("expected_ack_seq", &self.expected_ack_seq)
            .field("retry_count", &self.retry_count)
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

/// Try the non-blocking path first, then block for at most `timeout`.
fn write_frame(
    transport: &mut dyn Transport,
    bytes: &[u8],
    timeout: Duration,
) -> std::result::Result<(), TransportError> {
    if transport.try_send(bytes)? {
        return Ok(());
    }
    transport.send(bytes, timeout)
}
