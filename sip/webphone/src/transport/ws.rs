use super::{Connection, Connector, TransportEvent};
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

/// Opens secure WebSockets using the `sip` subprotocol (RFC 7118)
#[derive(Debug, Clone)]
pub struct WsConnector {
    open_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(10),
        }
    }
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum time to wait for the websocket handshake to complete
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Connection, TransportError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("sip"));

        let (stream, _) = tokio::time::timeout(self.open_timeout, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        log::debug!("websocket to {url} open");

        let (mut sink, mut stream) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::text(message)).await {
                    log::warn!("failed to write to websocket, {e}");
                    return;
                }
            }

            if let Err(e) = sink.close().await {
                log::debug!("failed to close websocket, {e}");
            }
        });

        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => TransportEvent::Frame(text.as_str().to_owned()),
                    Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(_) => {
                            log::warn!("discarding binary frame that is not utf-8");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => TransportEvent::Closed,
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                    Err(e) => TransportEvent::Error(e.to_string()),
                };

                let done = !matches!(event, TransportEvent::Frame(_));

                if inbound_tx.send(event).is_err() || done {
                    return;
                }
            }

            let _ = inbound_tx.send(TransportEvent::Closed);
        });

        Ok(Connection { outbound, inbound })
    }
}
