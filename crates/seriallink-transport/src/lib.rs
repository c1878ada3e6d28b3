//! Byte transport and clock abstractions.
//!
//! This is the lowest layer of seriallink. A channel needs exactly three
//! things from the outside world:
//! - a way to write a complete frame with a bounded timeout ([`Transport`])
//! - a monotonic millisecond clock ([`Clock`])
//! - someone pushing received bytes into it (see `seriallink-channel`)
//!
//! Everything else builds on the traits provided here.

pub mod clock;
pub mod error;
pub mod memory;
pub mod stream;
pub mod traits;

pub use clock::{ManualClock, SystemClock};
pub use error::{Result, TransportError};
pub use memory::{MemoryHandle, MemoryTransport};
pub use stream::StreamTransport;
pub use traits::{Clock, Transport};
