use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Lifecycle status of a [`CallSession`]
///
/// ```text
/// Connecting -> Ringing -> Answered -> Ended
///      |            |          |
///      +------------+----------+---> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Connecting,
    Ringing,
    Answered,
    Ended,
    Failed,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }

    fn can_become(self, next: CallStatus) -> bool {
        use CallStatus::*;

        matches!(
            (self, next),
            (Connecting, Ringing | Answered | Ended | Failed)
                | (Ringing, Answered | Ended | Failed)
                | (Answered, Ended | Failed)
        )
    }
}

/// Why a call reached [`CallStatus::Ended`] or [`CallStatus::Failed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    LocalHangup,
    RemoteHangup,
    /// Incoming call was declined locally
    Declined,
    /// Remote responded with a final error response
    Rejected { code: u16, reason: String },
    /// Remote canceled the incoming call before it was answered
    Canceled,
    /// No response to the INVITE
    Timeout,
    MediaAccess,
    Negotiation,
    TransportLost,
    /// Client disconnected or reconfigured with the call still live
    Disconnected,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::LocalHangup => f.write_str("local hangup"),
            EndReason::RemoteHangup => f.write_str("remote hangup"),
            EndReason::Declined => f.write_str("declined"),
            EndReason::Rejected { code, reason } => write!(f, "rejected with {code} {reason}"),
            EndReason::Canceled => f.write_str("canceled by remote"),
            EndReason::Timeout => f.write_str("timed out"),
            EndReason::MediaAccess => f.write_str("local media unavailable"),
            EndReason::Negotiation => f.write_str("media negotiation failed"),
            EndReason::TransportLost => f.write_str("transport lost"),
            EndReason::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Snapshot of the single live call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub id: Uuid,
    pub direction: Direction,
    /// The remote party, the dialed target or the caller's From uri
    pub remote_identity: String,
    pub status: CallStatus,
    /// Set when the call is answered
    pub start_time: Option<SystemTime>,
    /// Set when the call ends or fails
    pub end_time: Option<SystemTime>,
    pub end_reason: Option<EndReason>,
}

impl CallSession {
    pub(crate) fn outgoing(remote_identity: String) -> Self {
        Self::new(Direction::Outgoing, remote_identity, CallStatus::Connecting)
    }

    pub(crate) fn incoming(remote_identity: String) -> Self {
        Self::new(Direction::Incoming, remote_identity, CallStatus::Ringing)
    }

    fn new(direction: Direction, remote_identity: String, status: CallStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            direction,
            remote_identity,
            status,
            start_time: None,
            end_time: None,
            end_reason: None,
        }
    }

    /// Move to `next`, returns false if the transition is not allowed
    pub(crate) fn transition(&mut self, next: CallStatus) -> bool {
        if !self.status.can_become(next) {
            log::warn!(
                "call {}: ignoring transition {:?} -> {:?}",
                self.id,
                self.status,
                next
            );
            return false;
        }

        log::debug!("call {}: {:?} -> {:?}", self.id, self.status, next);

        match next {
            CallStatus::Answered => self.start_time = Some(SystemTime::now()),
            CallStatus::Ended | CallStatus::Failed => self.end_time = Some(SystemTime::now()),
            CallStatus::Connecting | CallStatus::Ringing => {}
        }

        self.status = next;
        true
    }

    pub(crate) fn terminate(&mut self, next: CallStatus, reason: EndReason) -> bool {
        debug_assert!(next.is_terminal());

        if self.transition(next) {
            self.end_reason = Some(reason);
            true
        } else {
            false
        }
    }
}

/// Call state as presented to the user interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// No call exists
    Idle,
    Calling,
    Ringing,
    Answered,
    /// Incoming call waiting to be answered
    Incoming,
    Ended,
    Failed,
}

impl CallState {
    pub fn is_in_call(self) -> bool {
        matches!(
            self,
            Self::Calling | Self::Ringing | Self::Answered | Self::Incoming
        )
    }
}

impl From<Option<&CallSession>> for CallState {
    fn from(session: Option<&CallSession>) -> Self {
        let Some(session) = session else {
            return CallState::Idle;
        };

        match (session.status, session.direction) {
            (CallStatus::Connecting, _) => CallState::Calling,
            (CallStatus::Ringing, Direction::Outgoing) => CallState::Ringing,
            (CallStatus::Ringing, Direction::Incoming) => CallState::Incoming,
            (CallStatus::Answered, _) => CallState::Answered,
            (CallStatus::Ended, _) => CallState::Ended,
            (CallStatus::Failed, _) => CallState::Failed,
        }
    }
}
