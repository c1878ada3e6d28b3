use std::fmt;

use serde::Serialize;
use seriallink_frame::codec::CommandField;
use seriallink_frame::{validate_command, FrameError, MAX_CMD_LEN};

use crate::state::TxState;

/// Handler slots per channel.
pub const MAX_HANDLERS: usize = 8;

/// Called with `(command, data)` for every accepted incoming command.
pub type CommandHandler = Box<dyn FnMut(&str, &str) + Send>;

/// Called with `(command, data, reason)` once per failed transaction.
pub type FailureHandler = Box<dyn FnMut(&str, &str, FailReason) + Send>;

/// Called with `(old, new, retry_count)` whenever the transaction state changes.
pub type StateChangeHandler = Box<dyn FnMut(TxState, TxState, u8) + Send>;

/// Why an outgoing command was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// No matching acknowledgement after every retransmission.
    Timeout,
}

impl FailReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a handler could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// The command name could never arrive in a frame.
    #[error(transparent)]
    Invalid(#[from] FrameError),

    /// Every slot is taken by another command.
    #[error("handler table full (max {MAX_HANDLERS})")]
    Full,
}

struct Entry {
    command: CommandField,
    handler: CommandHandler,
}

/// Fixed-capacity command to handler map.
///
/// Registering an existing command replaces its handler in place; a new
/// command takes the next free slot.
#[derive(Default)]
pub struct HandlerTable {
    entries: heapless::Vec<Entry, MAX_HANDLERS>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the handler for `command`.
    pub fn register(&mut self, command: &str, handler: CommandHandler) -> Result<(), RegisterError> {
        validate_command(command, "")?;

        if let Some(entry) = self.entries.iter_mut().find(|e| e.command == command) {
            entry.handler = handler;
            return Ok(());
        }

        let mut name = CommandField::new();
        name.push_str(command)
            .map_err(|()| FrameError::CommandTooLong {
                len: command.len(),
                max: MAX_CMD_LEN,
            })?;
        self.entries
            .push(Entry { command: name, handler })
            .map_err(|_| RegisterError::Full)
    }

    /// Handler registered for `command`, if any.
    pub fn get_mut(&mut self, command: &str) -> Option<&mut CommandHandler> {
        self.entries
            .iter_mut()
            .find(|e| e.command == command)
            .map(|e| &mut e.handler)
    }

    pub fn contains(&self, command: &str) -> bool {
        self.entries.iter().any(|e| e.command == command)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered command names in slot order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.command.as_str())
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.commands()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>, by: usize) -> CommandHandler {
        let counter = Arc::clone(counter);
        Box::new(move |_, _| {
            counter.fetch_add(by, Ordering::SeqCst);
        })
    }

    #[test]
    fn register_and_lookup() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = HandlerTable::new();
        table.register("GET", counting(&hits, 1)).unwrap();

        assert!(table.contains("GET"));
        assert!(table.get_mut("SET").is_none());
        (table.get_mut("GET").unwrap())("GET", "TEMP");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reregister_overwrites_in_place() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = HandlerTable::new();
        table.register("GET", counting(&hits, 1)).unwrap();
        table.register("GET", counting(&hits, 10)).unwrap();

        assert_eq!(table.len(), 1);
        (table.get_mut("GET").unwrap())("GET", "");
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn ninth_command_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = HandlerTable::new();
        for i in 0..MAX_HANDLERS {
            table
                .register(&format!("CMD{i}"), counting(&hits, 1))
                .unwrap();
        }
        let full = table.register("EXTRA", counting(&hits, 1)).unwrap_err();
        assert_eq!(full, RegisterError::Full);

        // Overwriting still works when full.
        table.register("CMD3", counting(&hits, 1)).unwrap();
        assert_eq!(table.len(), MAX_HANDLERS);
    }

    #[test]
    fn unframeable_names_rejected() {
        let mut table = HandlerTable::new();
        let err = table.register("A:B", Box::new(|_, _| {})).unwrap_err();
        assert_eq!(err, RegisterError::Invalid(FrameError::ReservedCharacter(':')));
        assert!(table.is_empty());
    }

    #[test]
    fn control_names_rejected() {
        let mut table = HandlerTable::new();
        for name in ["ACK", "NAK"] {
            let err = table.register(name, Box::new(|_, _| {})).unwrap_err();
            assert_eq!(
                err,
                RegisterError::Invalid(FrameError::ReservedCommand(name.to_string()))
            );
        }
        assert!(table.is_empty());
    }

    #[test]
    fn fail_reason_text() {
        assert_eq!(FailReason::Timeout.to_string(), "timeout");
    }
}
