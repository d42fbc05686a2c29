//! Session lifecycle state machine.

use std::fmt;

/// The lifecycle phase of one relayed connection.
///
/// ```text
/// Connecting → Ready → Relaying → Closing → Closed
///      │         │         │         ↑
///      └─────────┴─────────┴─────────┘
/// ```
///
/// - **Connecting**: client accepted, upstream being dialed, handshake
///   barrier not yet passed.
/// - **Ready**: both legs finished their handshake; loops not started.
/// - **Relaying**: relay tasks are running.
/// - **Closing**: teardown started; nothing may be forwarded any more.
/// - **Closed**: both endpoints closed and every task has exited.
///
/// Transitions only ever move forward. Any live phase may jump straight to
/// `Closing`; `Closed` is only reachable through `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Connecting,
    Ready,
    Relaying,
    Closing,
    Closed,
}

impl SessionPhase {
    /// Returns `true` until teardown has begun.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Ready | Self::Relaying)
    }

    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Connecting, Self::Ready)
                | (Self::Ready, Self::Relaying)
                | (Self::Connecting | Self::Ready | Self::Relaying, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "Connecting",
            Self::Ready => "Ready",
            Self::Relaying => "Relaying",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionPhase::*;

    const ALL: [SessionPhase; 5] = [Connecting, Ready, Relaying, Closing, Closed];

    #[test]
    fn test_happy_path_transitions() {
        assert!(Connecting.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Relaying));
        assert!(Relaying.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
    }

    #[test]
    fn test_every_live_phase_can_start_teardown() {
        for phase in [Connecting, Ready, Relaying] {
            assert!(phase.can_transition_to(Closing), "{phase} → Closing");
            assert!(!phase.can_transition_to(Closed), "{phase} must pass through Closing");
        }
    }

    #[test]
    fn test_no_backward_or_self_transitions() {
        for (i, from) in ALL.iter().enumerate() {
            assert!(!from.can_transition_to(*from), "{from} → itself");
            for to in &ALL[..i] {
                assert!(!from.can_transition_to(*to), "{from} → {to}");
            }
        }
    }

    #[test]
    fn test_no_skipping_ahead_while_live() {
        assert!(!Connecting.can_transition_to(Relaying));
        assert!(!Closed.can_transition_to(Closing));
    }

    #[test]
    fn test_liveness() {
        assert!(Connecting.is_live());
        assert!(Relaying.is_live());
        assert!(!Closing.is_live());
        assert!(!Closed.is_live());
    }

    #[test]
    fn test_display() {
        assert_eq!(Relaying.to_string(), "Relaying");
        assert_eq!(Closed.to_string(), "Closed");
    }
}
