use std::fmt;

use serde::Serialize;

/// Transaction state of a channel.
///
/// The engine only ever enters [`TxState::Idle`] and [`TxState::WaitAck`].
/// The remaining variants are reserved labels that appear in status output
/// and state-change notifications from applications that drive them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxState {
    /// No outstanding command.
    #[default]
    Idle,
    /// Reserved.
    Sending,
    /// A command is out and its acknowledgement has not arrived.
    WaitAck,
    /// Reserved.
    Retry,
    /// Reserved.
    Receiving,
    /// Reserved.
    Processing,
    /// Reserved.
    Error,
}

impl TxState {
    pub fn label(self) -> &'static str {
        match self {
            TxState::Idle => "IDLE",
            TxState::Sending => "SENDING",
            TxState::WaitAck => "WAIT_ACK",
            TxState::Retry => "RETRY",
            TxState::Receiving => "RECEIVING",
            TxState::Processing => "PROCESSING",
            TxState::Error => "ERROR",
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_serialized_form() {
        for state in [
            TxState::Idle,
            TxState::Sending,
            TxState::WaitAck,
            TxState::Retry,
            TxState::Receiving,
            TxState::Processing,
            TxState::Error,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.label()));
        }
    }
}
