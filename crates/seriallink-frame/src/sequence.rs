//! Sequence number allocation and the receive acceptance window.
//!
//! Sequence numbers are 8-bit and wrap. Outgoing commands never use 0; that
//! value belongs to control frames. Incoming commands are judged by their
//! wrap-corrected distance from the last accepted sequence:
//!
//! | delta       | verdict                         |
//! |-------------|---------------------------------|
//! | `1..=10`    | accept (up to 9 lost frames)    |
//! | `0`         | duplicate: re-ACK, no dispatch  |
//! | `< 0`       | regression: NAK                 |
//! | `> 10`      | jump too large: NAK             |
//!
//! This is a heuristic window, not a sliding-window protocol.

/// Largest forward jump still accepted.
pub const ACCEPT_WINDOW: i16 = 10;

/// Outcome of checking an incoming sequence against the last accepted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceVerdict {
    /// In order, or ahead by at most [`ACCEPT_WINDOW`].
    Accept,
    /// Same as the last accepted sequence.
    Duplicate,
    /// Behind the last accepted sequence.
    Regressed,
    /// Further ahead than the window allows.
    JumpTooLarge,
}

impl SequenceVerdict {
    /// True for the verdicts answered with a NAK.
    pub fn is_rejected(self) -> bool {
        matches!(self, SequenceVerdict::Regressed | SequenceVerdict::JumpTooLarge)
    }
}

/// Wrap-corrected signed distance from `current` to `incoming`, in `-128..=128`.
pub fn sequence_delta(current: u8, incoming: u8) -> i16 {
    let mut delta = i16::from(incoming) - i16::from(current);
    if delta > 128 {
        delta -= 256;
    } else if delta < -128 {
        delta += 256;
    }
    delta
}

/// Judge `incoming` against the last accepted sequence `current`.
pub fn accept_rx_sequence(current: u8, incoming: u8) -> SequenceVerdict {
    match sequence_delta(current, incoming) {
        0 => SequenceVerdict::Duplicate,
        d if d < 0 => SequenceVerdict::Regressed,
        d if d <= ACCEPT_WINDOW => SequenceVerdict::Accept,
        _ => SequenceVerdict::JumpTooLarge,
    }
}

/// Outgoing sequence counter. Starts at 0 so the first allocation is 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxSequence {
    last: u8,
}

impl TxSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence, skipping 0 on wraparound.
    pub fn next_tx_sequence(&mut self) -> u8 {
        self.last = self.last.wrapping_add(1);
        if self.last == 0 {
            self.last = 1;
        }
        self.last
    }

    /// Last sequence handed out (0 if none yet).
    pub fn last(&self) -> u8 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_around_five() {
        for incoming in 6..=15 {
            assert_eq!(
                accept_rx_sequence(5, incoming),
                SequenceVerdict::Accept,
                "incoming {incoming}"
            );
        }
        assert_eq!(accept_rx_sequence(5, 5), SequenceVerdict::Duplicate);
        assert_eq!(accept_rx_sequence(5, 4), SequenceVerdict::Regressed);
        assert_eq!(accept_rx_sequence(5, 16), SequenceVerdict::JumpTooLarge);
    }

    #[test]
    fn window_wraps_forward() {
        assert_eq!(sequence_delta(250, 3), 9);
        assert_eq!(accept_rx_sequence(250, 3), SequenceVerdict::Accept);
        assert_eq!(accept_rx_sequence(255, 1), SequenceVerdict::Accept);
        assert_eq!(accept_rx_sequence(250, 5), SequenceVerdict::JumpTooLarge);
    }

    #[test]
    fn window_wraps_backward() {
        assert_eq!(sequence_delta(3, 250), -9);
        assert_eq!(accept_rx_sequence(3, 250), SequenceVerdict::Regressed);
    }

    #[test]
    fn fresh_receiver_accepts_first_command() {
        assert_eq!(accept_rx_sequence(0, 1), SequenceVerdict::Accept);
    }

    #[test]
    fn rejected_verdicts() {
        assert!(SequenceVerdict::Regressed.is_rejected());
        assert!(SequenceVerdict::JumpTooLarge.is_rejected());
        assert!(!SequenceVerdict::Duplicate.is_rejected());
        assert!(!SequenceVerdict::Accept.is_rejected());
    }

    #[test]
    fn tx_sequence_skips_zero() {
        let mut seq = TxSequence::new();
        assert_eq!(seq.next_tx_sequence(), 1);

        let mut seen_zero = false;
        for _ in 0..600 {
            if seq.next_tx_sequence() == 0 {
                seen_zero = true;
            }
        }
        assert!(!seen_zero);
    }

    #[test]
    fn tx_sequence_wraps_to_one() {
        let mut seq = TxSequence::new();
        for _ in 0..255 {
            seq.next_tx_sequence();
        }
        assert_eq!(seq.last(), 255);
        assert_eq!(seq.next_tx_sequence(), 1);
    }
}
