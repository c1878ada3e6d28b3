use std::sync::Arc;

use seriallink_frame::{PING, PING_DATA};
use seriallink_transport::{Clock, SystemClock, Transport};
use tracing::{debug, info};

use crate::channel::{Channel, ChannelKey};
use crate::config::ChannelConfig;
use crate::error::{LinkError, Result};
use crate::handlers::FailReason;
use crate::rx::ByteSink;
use crate::state::TxState;
use crate::stats::ChannelStats;

/// Channels one link can hold.
pub const MAX_CHANNELS: usize = 8;

/// Label reported for keys with no registered channel.
pub const NOT_FOUND_LABEL: &str = "NOT_FOUND";

/// Registry of channels and the entry point for all protocol work.
///
/// Owned by the application; nothing here is global. Registration is
/// append-only and idempotent per key. Call [`Link::tick`] about once a
/// millisecond from one place.
pub struct Link {
    channels: heapless::Vec<Channel, MAX_CHANNELS>,
    clock: Arc<dyn Clock>,
    config: ChannelConfig,
}

impl Link {
    /// Link driven by the system monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Link driven by an explicit clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            channels: heapless::Vec::new(),
            clock,
            config: ChannelConfig::default(),
        }
    }

    /// Config applied to channels registered after this call.
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Register a channel for `transport` under `key` with the link config.
    ///
    /// Registering a key twice returns the existing channel's sink and drops
    /// the new transport.
    pub fn register<T>(&mut self, key: impl Into<ChannelKey>, transport: T) -> Result<ByteSink>
    where
        T: Transport + 'static,
    {
        let config = self.config;
        self.register_with_config(key, transport, config)
    }

    /// Register a channel with its own config.
    pub fn register_with_config<T>(
        &mut self,
        key: impl Into<ChannelKey>,
        transport: T,
        config: ChannelConfig,
    ) -> Result<ByteSink>
    where
        T: Transport + 'static,
    {
        let key = key.into();
        if let Some(channel) = self.find(key.as_str()) {
            debug!(channel = %key, "already registered");
            return Ok(channel.byte_sink());
        }

        let channel = Channel::new(key.clone(), Box::new(transport), Arc::clone(&self.clock), config);
        let sink = channel.byte_sink();
        self.channels
            .push(channel)
            .map_err(|_| LinkError::RegistryFull(MAX_CHANNELS))?;
        info!(channel = %key, slots = self.channels.len(), "channel registered");
        Ok(sink)
    }

    /// Another producer handle for a registered channel.
    pub fn byte_sink(&self, key: &str) -> Option<ByteSink> {
        self.find(key).map(Channel::byte_sink)
    }

    /// Push received bytes straight into a channel.
    pub fn feed(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let channel = self.get(key)?;
        channel.byte_sink().push_slice(bytes);
        Ok(())
    }

    /// Register or replace the handler for an incoming command.
    pub fn on_command<F>(&mut self, key: &str, command: &str, handler: F) -> Result<()>
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.get_mut(key)?.on_command(command, Box::new(handler))
    }

    /// Set the handler called once per command that runs out of retries.
    pub fn on_failure<F>(&mut self, key: &str, handler: F) -> Result<()>
    where
        F: FnMut(&str, &str, FailReason) + Send + 'static,
    {
        self.get_mut(key)?.on_failure(Box::new(handler));
        Ok(())
    }

    /// Set the handler called on every transaction state change.
    pub fn on_state_change<F>(&mut self, key: &str, handler: F) -> Result<()>
    where
        F: FnMut(TxState, TxState, u8) + Send + 'static,
    {
        self.get_mut(key)?.on_state_change(Box::new(handler));
        Ok(())
    }

    /// Send a command on a channel.
    pub fn send(&mut self, key: &str, command: &str, data: &str) -> Result<()> {
        self.get_mut(key)?.send(command, data)
    }

    /// Send the liveness check `{PING:TEST#..}`.
    pub fn ping(&mut self, key: &str) -> Result<()> {
        self.send(key, PING, PING_DATA)
    }

    /// True when the channel exists and can send. False for unknown keys.
    pub fn is_ready(&self, key: &str) -> bool {
        self.find(key).is_some_and(Channel::is_ready)
    }

    /// Transaction state label, or `"NOT_FOUND"`.
    pub fn state_label(&self, key: &str) -> &'static str {
        self.find(key)
            .map_or(NOT_FOUND_LABEL, |channel| channel.state().label())
    }

    /// Current retry count, 0 for unknown keys.
    pub fn retry_count(&self, key: &str) -> u8 {
        self.find(key).map_or(0, Channel::retry_count)
    }

    pub fn stats(&self, key: &str) -> Option<ChannelStats> {
        self.find(key).map(Channel::stats)
    }

    /// Return a channel to power-on protocol state.
    pub fn reset_channel(&mut self, key: &str) -> Result<()> {
        self.get_mut(key)?.reset();
        Ok(())
    }

    /// Run protocol work for every channel in registration order.
    pub fn tick(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.tick();
        }
    }

    pub fn channel(&self, key: &str) -> Option<&Channel> {
        self.find(key)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    fn find(&self, key: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.key().as_str() == key)
    }

    fn get(&self, key: &str) -> Result<&Channel> {
        self.find(key)
            .ok_or_else(|| LinkError::ChannelNotFound(key.to_string()))
    }

    fn get_mut(&mut self, key: &str) -> Result<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|c| c.key().as_str() == key)
            .ok_or_else(|| LinkError::ChannelNotFound(key.to_string()))
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("channels", &self.channels)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
