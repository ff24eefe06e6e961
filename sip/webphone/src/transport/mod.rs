//! WebSocket transport of SIP messages
//!
//! The [`Connector`] trait opens a socket and hands back a pair of channels, so
//! the client never touches the socket itself. [`WsConnector`] is the real
//! implementation, tests plug in in-memory connectors.

use crate::error::TransportError;
use async_trait::async_trait;
use std::future::pending;
use tokio::sync::mpsc;
use url::Url;

mod ws;

pub use ws::WsConnector;

/// Opens message based connections to a signaling server
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Connection, TransportError>;
}

/// An open connection, one SIP message per frame
///
/// Dropping `outbound` closes the connection.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(String),
    /// Remote closed the connection
    Closed,
    Error(String),
}

/// Owner of at most one connection, closed while there is none
pub(crate) struct Transport {
    connection: Option<Connection>,
}

impl Transport {
    pub(crate) fn new() -> Self {
        Self { connection: None }
    }

    /// Replace the current connection with a new one to `url`
    pub(crate) async fn open(
        &mut self,
        connector: &dyn Connector,
        url: &Url,
    ) -> Result<(), TransportError> {
        self.close();

        if url.scheme() != "wss" {
            return Err(TransportError::InsecureScheme(url.to_string()));
        }

        log::debug!("opening transport to {url}");

        self.connection = Some(connector.connect(url).await?);
        Ok(())
    }

    pub(crate) fn send(&mut self, message: String) -> Result<(), TransportError> {
        let connection = self.connection.as_ref().ok_or(TransportError::NotOpen)?;

        log::trace!("sending message\n{message}");

        if connection.outbound.send(message).is_err() {
            self.fail("writer is gone");
            return Err(TransportError::NotOpen);
        }

        Ok(())
    }

    /// Receive the next frame
    ///
    /// Returns `None` once the connection is lost, after which the transport is
    /// closed. Never resolves while no connection is open.
    pub(crate) async fn recv(&mut self) -> Option<String> {
        let Some(connection) = &mut self.connection else {
            return pending().await;
        };

        let event = connection.inbound.recv().await;

        match event {
            Some(TransportEvent::Frame(frame)) => {
                log::trace!("received message\n{frame}");
                Some(frame)
            }
            Some(TransportEvent::Closed) | None => {
                self.fail("closed by remote");
                None
            }
            Some(TransportEvent::Error(e)) => {
                self.fail(&e);
                None
            }
        }
    }

    pub(crate) fn close(&mut self) {
        if self.connection.take().is_some() {
            log::debug!("transport closed");
        }
    }

    fn fail(&mut self, reason: &str) {
        log::warn!("transport lost, {reason}");
        self.connection = None;
    }
}
