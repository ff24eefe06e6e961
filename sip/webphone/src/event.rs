use crate::call::{CallSession, CallState};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// Transport is open, but there is no valid registration
    Connected,
    Registered,
    Error,
}

/// Everything the client reports to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connection(ConnectionStatus),
    Call(CallEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    pub state: CallState,
    /// Snapshot after the transition, `None` when `state` is [`CallState::Idle`]
    pub session: Option<CallSession>,
}

impl CallEvent {
    pub(crate) fn new(session: Option<&CallSession>) -> Self {
        Self {
            state: CallState::from(session),
            session: session.cloned(),
        }
    }
}

/// Receiving end of the events of a [`Client`](crate::Client)
///
/// Events of each kind are delivered in the order the transitions happened.
pub type Events = mpsc::UnboundedReceiver<Event>;
