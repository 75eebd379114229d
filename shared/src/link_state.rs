//! Link State Machine
//!
//! Defines the connection lifecycle of the telemetry stream:
//!
//! ```text
//! Disconnected -> Connecting -> Open -> (Closing | Error) -> Disconnected
//! ```

/// Connection state of a transport client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
    Error,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LinkState::Disconnected => "DISCONNECTED",
            LinkState::Connecting => "CONNECTING",
            LinkState::Open => "OPEN",
            LinkState::Closing => "CLOSING",
            LinkState::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Published link status
///
/// `epoch` increments every time the link reaches `Open`, so work handed to
/// one connection can be told apart from work for a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub state: LinkState,
    pub epoch: u64,
}

impl LinkStatus {
    pub fn is_open(&self) -> bool {
        self.state == LinkState::Open
    }
}

/// Events that drive link transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connect attempt started
    ConnectStarted,
    /// The handshake completed
    Established,
    /// Connect, read or send failed
    Failed,
    /// The peer closed the stream, or a local stop was requested
    CloseRequested,
    /// The connection has been torn down
    Released,
}

/// Result of a transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed { from: LinkState, to: LinkState },
    Invalid { from: LinkState, event: LinkEvent },
}

/// Tracks the link state and the connection epoch
#[derive(Debug, Default)]
pub struct LinkStateMachine {
    status: LinkStatus,
}

impl LinkStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LinkState {
        self.status.state
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Process an event and return the transition result
    pub fn apply(&mut self, event: LinkEvent) -> Transition {
        let from = self.status.state;
        match next_state(from, event) {
            Some(to) => {
                if to == LinkState::Open {
                    self.status.epoch += 1;
                }
                self.status.state = to;
                Transition::Changed { from, to }
            }
            None => Transition::Invalid { from, event },
        }
    }
}

/// Get the next state for a given event, if the transition is valid
fn next_state(from: LinkState, event: LinkEvent) -> Option<LinkState> {
    use LinkEvent::*;
    use LinkState::*;

    match (from, event) {
        (Disconnected, ConnectStarted) => Some(Connecting),
        (Disconnected, Released) => Some(Disconnected),

        (Connecting, Established) => Some(Open),
        (Connecting, Failed) => Some(Error),
        (Connecting, CloseRequested) => Some(Closing),

        (Open, Failed) => Some(Error),
        (Open, CloseRequested) => Some(Closing),

        (Closing, Failed) => Some(Error),
        (Closing | Error, Released) => Some(Disconnected),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = LinkStateMachine::new();
        assert_eq!(fsm.state(), LinkState::Disconnected);
        assert_eq!(fsm.status().epoch, 0);
    }

    #[test]
    fn test_normal_lifecycle() {
        let mut fsm = LinkStateMachine::new();

        assert!(matches!(
            fsm.apply(LinkEvent::ConnectStarted),
            Transition::Changed { to: LinkState::Connecting, .. }
        ));
        assert!(matches!(
            fsm.apply(LinkEvent::Established),
            Transition::Changed { to: LinkState::Open, .. }
        ));
        assert!(fsm.status().is_open());
        assert_eq!(fsm.status().epoch, 1);

        assert!(matches!(
            fsm.apply(LinkEvent::CloseRequested),
            Transition::Changed { to: LinkState::Closing, .. }
        ));
        assert!(matches!(
            fsm.apply(LinkEvent::Released),
            Transition::Changed { to: LinkState::Disconnected, .. }
        ));
    }

    #[test]
    fn test_failed_connect_goes_through_error() {
        let mut fsm = LinkStateMachine::new();
        fsm.apply(LinkEvent::ConnectStarted);
        fsm.apply(LinkEvent::Failed);
        assert_eq!(fsm.state(), LinkState::Error);
        fsm.apply(LinkEvent::Released);
        assert_eq!(fsm.state(), LinkState::Disconnected);
        assert_eq!(fsm.status().epoch, 0);
    }

    #[test]
    fn test_epoch_increments_per_open() {
        let mut fsm = LinkStateMachine::new();
        for _ in 0..3 {
            fsm.apply(LinkEvent::ConnectStarted);
            fsm.apply(LinkEvent::Established);
            fsm.apply(LinkEvent::Failed);
            fsm.apply(LinkEvent::Released);
        }
        assert_eq!(fsm.status().epoch, 3);
    }

    #[test]
    fn test_invalid_transition() {
        let mut fsm = LinkStateMachine::new();

        // Can't open without connecting first
        let result = fsm.apply(LinkEvent::Established);
        assert!(matches!(result, Transition::Invalid { .. }));
        assert_eq!(fsm.state(), LinkState::Disconnected);
    }
}
