//! Acknowledged command channels over serial transports.
//!
//! This is the layer applications talk to. A [`Link`] holds up to eight
//! channels, one per transport. Each channel:
//! - sends one command at a time and waits for its `ACK`
//! - retransmits the same sequence on timeout or `NAK`, then reports failure
//! - acknowledges, deduplicates and dispatches incoming commands
//!
//! Received bytes enter through a [`ByteSink`] from any thread; all protocol
//! work happens in [`Link::tick`].

pub mod channel;
pub mod config;
pub mod error;
pub mod handlers;
pub mod link;
pub mod rx;
pub mod state;
pub mod stats;
#[cfg(feature = "async")]
pub mod ticker;

pub use channel::{Channel, ChannelKey};
pub use config::ChannelConfig;
pub use error::{LinkError, Result};
pub use handlers::{
    CommandHandler, FailReason, FailureHandler, HandlerTable, StateChangeHandler, MAX_HANDLERS,
};
pub use link::{Link, MAX_CHANNELS, NOT_FOUND_LABEL};
pub use rx::ByteSink;
pub use state::TxState;
pub use stats::ChannelStats;
#[cfg(feature = "async")]
pub use ticker::{run_ticker, DEFAULT_TICK_PERIOD};
