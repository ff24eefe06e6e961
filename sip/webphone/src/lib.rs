//! SIP over WebSocket softphone core
//!
//! Registers an address of record with a SIP server reachable over a secure
//! websocket (RFC 7118) and handles a single audio call at a time. Media capture
//! and negotiation are left to a [`MediaBackend`] provided by the embedding
//! application, e.g. a WebRTC peer connection.
//!
//! ```no_run
//! # use webphone::*;
//! # async fn run(media: impl MediaFactory) -> Result<()> {
//! let (client, mut events) = Client::new(media);
//!
//! client
//!     .connect(ClientConfig::new(
//!         "sip:alice@example.org",
//!         "alice",
//!         "secret",
//!         "wss://sip.example.org/ws",
//!     ))
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     if event == Event::Connection(ConnectionStatus::Registered) {
//!         client.call("+15551234567").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod call;
mod client;
mod config;
mod dialog;
mod error;
mod event;
mod media;
mod registration;
pub mod sdp;
pub mod transport;

pub use call::{CallSession, CallState, CallStatus, Direction, EndReason};
pub use client::Client;
pub use config::{ClientConfig, IceScheme, IceServer};
pub use error::{AuthError, ConfigError, Error, Result, TransportError};
pub use event::{CallEvent, ConnectionStatus, Event, Events};
pub use media::{MediaBackend, MediaError, MediaFactory};
pub use sdp::{SdpError, SdpType, SessionDescription};
