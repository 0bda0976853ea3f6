//! Socket layer beneath `RelayConnection`.
//!
//! A transport opens one message-based connection per relay and hands back a
//! [`RelaySocket`]: a sink for outgoing text frames plus a channel of incoming
//! text frames. The inbound channel closing means the connection is gone.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

/// Outgoing half of a relay socket.
pub trait FrameSink: Send + Sync {
    /// Queue a text frame for the relay.
    fn send(&self, text: String) -> Result<()>;

    /// Start a clean close of the connection.
    fn close(&self);
}

/// An open connection to one relay.
pub struct RelaySocket {
    pub sink: Box<dyn FrameSink>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Opens relay sockets.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn open(&self, url: &Url, connect_timeout: Duration) -> Result<RelaySocket>;
}

/// WebSocket transport over tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

struct WebSocketSink {
    outgoing: mpsc::UnboundedSender<Message>,
}

impl FrameSink for WebSocketSink {
    fn send(&self, text: String) -> Result<()> {
        self.outgoing
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::NotConnected)
    }

    fn close(&self) {
        let _ = self.outgoing.send(Message::Close(None));
    }
}

#[async_trait]
impl RelayTransport for WebSocketTransport {
    async fn open(&self, url: &Url, connect_timeout: Duration) -> Result<RelaySocket> {
        let (stream, _response) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                ClientError::Timeout(format!("connection timeout after {:?}", connect_timeout))
            })?
            .map_err(|error| ClientError::WebSocket(error.to_string()))?;

        let (mut writer, mut reader) = stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let relay_url = url.to_string();
        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(error) = writer.send(message).await {
                    warn!("websocket write error on {}: {}", relay_url, error);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let relay_url = url.to_string();
        tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        debug!("received ping from {} ({} bytes)", relay_url, payload.len());
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {}
                    Err(error) => {
                        warn!("websocket read error on {}: {}", relay_url, error);
                        break;
                    }
                }
            }
        });

        Ok(RelaySocket {
            sink: Box::new(WebSocketSink {
                outgoing: outgoing_tx,
            }),
            inbound: inbound_rx,
        })
    }
}
