use crate::media::MediaError;
use sip_auth::DigestError;
use sip_types::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the operations of [`Client`](crate::Client)
///
/// Only local failures are returned here. Failures that happen asynchronously
/// (remote rejection, transport loss, failed negotiation) are reported as
/// [`Event`](crate::Event)s instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("calls require an active registration")]
    NotRegistered,
    #[error("a call is already in progress")]
    Busy,
    #[error("there is no active call")]
    NoActiveSession,
    #[error("the active call is not an incoming call waiting to be answered")]
    NotAnswerable,
    #[error("client has been shut down")]
    Shutdown,
}

/// Invalid [`ClientConfig`](crate::ClientConfig) values, detected before any network activity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("invalid address of record {0:?}, expected sip:user@host")]
    InvalidUri(String),
    #[error("invalid server url {0:?}")]
    InvalidServer(String),
    #[error("server url must use the wss scheme, got {0:?}")]
    InsecureServer(String),
    #[error("invalid ICE server {0:?}, expected a stun:, stuns:, turn: or turns: uri")]
    InvalidIceServer(String),
    #[error("invalid call target {0:?}")]
    InvalidTarget(String),
    #[error("invalid registration lifetime {0:?}")]
    InvalidExpires(std::time::Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("refusing to connect to {0}, only wss is allowed")]
    InsecureScheme(String),
    #[error("failed to open websocket, {0}")]
    Connect(String),
    #[error("timed out opening websocket")]
    Timeout,
    #[error("transport is not open")]
    NotOpen,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("registration rejected with {0}")]
    Rejected(StatusCode),
    #[error("registrar challenged the answered credentials again")]
    ChallengedTwice,
    #[error(transparent)]
    Digest(#[from] DigestError),
    #[error("registration timed out")]
    Timeout,
}
