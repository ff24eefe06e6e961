use crate::config::IceServer;
use crate::sdp::{SdpError, SdpType, SessionDescription};
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("access to local media was denied")]
    AccessDenied,
    #[error("local media is unavailable, {0}")]
    Unavailable(String),
    #[error("media negotiation failed, {0}")]
    Negotiation(String),
}

impl From<SdpError> for MediaError {
    fn from(e: SdpError) -> Self {
        MediaError::Negotiation(e.to_string())
    }
}

/// Local media capture and peer negotiation of a single call
///
/// Implemented by the embedding platform, e.g. on top of a WebRTC peer connection.
pub trait MediaBackend: Send + 'static {
    /// Request the microphone, must be called before creating any description
    fn acquire_local_media(&mut self) -> impl Future<Output = Result<(), MediaError>> + Send;

    fn create_offer(
        &mut self,
    ) -> impl Future<Output = Result<SessionDescription, MediaError>> + Send;

    /// Create an answer to the previously applied remote offer
    fn create_answer(
        &mut self,
    ) -> impl Future<Output = Result<SessionDescription, MediaError>> + Send;

    fn apply_remote_description(
        &mut self,
        kind: SdpType,
        sdp: SessionDescription,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;

    /// Stop local capture and tear down the peer connection
    fn release(&mut self);
}

/// Creates a [`MediaBackend`] for every call
pub trait MediaFactory: Send + 'static {
    type Backend: MediaBackend;

    fn create(&self, ice_servers: &[IceServer]) -> Self::Backend;
}

/// Owns the backend of a call and releases it exactly once
pub(crate) struct MediaSlot<B: MediaBackend> {
    backend: B,
    released: bool,
}

impl<B: MediaBackend> MediaSlot<B> {
    pub(crate) fn new(backend: B) -> Self {
        Self {
            backend,
            released: false,
        }
    }

    pub(crate) fn backend(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.backend.release();
        }
    }
}

impl<B: MediaBackend> Drop for MediaSlot<B> {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("media of call was not released explicitly");
            self.release();
        }
    }
}
