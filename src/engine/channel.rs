// DocChat Transport Engine — Channel Layer
//
// The bidirectional frame channel underneath the transport, behind a trait
// so the driver is testable against a scripted fake and the websocket
// wiring stays in one place.
//
// The concrete implementation speaks JSON text frames over a websocket
// (tokio-tungstenite). Pings are answered transparently; close frames are
// classified so the reconnect policy can distinguish a deliberate server
// goodbye from a broken pipe.

use crate::atoms::error::{TransportError, TransportResult};
use crate::atoms::types::DisconnectReason;
use crate::engine::config::{normalize_server_url, websocket_url, TransportConfig};
use crate::engine::wire::{InboundFrame, OutboundFrame};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

// ── Channel abstraction ────────────────────────────────────────────────

/// One event surfaced by a live channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A parsed inbound frame.
    Frame(InboundFrame),
    /// The channel is gone. Terminal for this channel instance; the driver
    /// decides whether to reconnect based on the reason.
    Closed(DisconnectReason),
}

/// A live, connected frame channel.
#[async_trait]
pub trait Channel: Send {
    async fn send(&mut self, frame: &OutboundFrame) -> TransportResult<()>;

    /// Next event. Unparseable frames are skipped internally, so this only
    /// resolves with traffic the session can dispatch — or with `Closed`,
    /// exactly once, after which the channel is dead.
    async fn next_event(&mut self) -> ChannelEvent;
}

/// Factory for channels: one `connect()` call per connection attempt.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self) -> TransportResult<Box<dyn Channel>>;
}

// ── WebSocket implementation ───────────────────────────────────────────

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketChannel {
    tx: SplitSink<WsStream, WsMessage>,
    rx: SplitStream<WsStream>,
}

#[async_trait]
impl Channel for WebSocketChannel {
    async fn send(&mut self, frame: &OutboundFrame) -> TransportResult<()> {
        let text = frame.encode()?;
        self.tx.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> ChannelEvent {
        loop {
            let msg = match self.rx.next().await {
                Some(Ok(m)) => m,
                Some(Err(e)) => {
                    warn!("[ws] read error: {}", e);
                    return ChannelEvent::Closed(DisconnectReason::TransportFault);
                }
                // Stream ended without a close frame — broken pipe.
                None => return ChannelEvent::Closed(DisconnectReason::TransportFault),
            };

            match msg {
                WsMessage::Text(text) => match InboundFrame::parse(&text) {
                    Ok(frame) => return ChannelEvent::Frame(frame),
                    Err(e) => {
                        debug!("[ws] skipping frame: {}", e);
                        continue;
                    }
                },
                WsMessage::Ping(payload) => {
                    if let Err(e) = self.tx.send(WsMessage::Pong(payload)).await {
                        warn!("[ws] pong failed: {}", e);
                        return ChannelEvent::Closed(DisconnectReason::TransportFault);
                    }
                }
                WsMessage::Close(frame) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((u16::from(CloseCode::Status), String::new()));
                    info!("[ws] server closed the channel: code={} {}", code, reason);
                    return ChannelEvent::Closed(DisconnectReason::ServerClose);
                }
                // Binary and raw frames are not part of the chat contract.
                _ => continue,
            }
        }
    }
}

// ── Connector ──────────────────────────────────────────────────────────

pub struct WebSocketConnector {
    ws_url: String,
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Connector for an explicit websocket endpoint (`ws://` / `wss://`).
    pub fn new(ws_url: impl Into<String>, connect_timeout: Duration) -> Self {
        WebSocketConnector {
            ws_url: ws_url.into(),
            connect_timeout,
        }
    }

    /// Connector derived from the transport configuration: the server URL
    /// is normalized (https enforced) and the `wss://host/ws` endpoint is
    /// derived from it.
    pub fn from_config(config: &TransportConfig) -> TransportResult<Self> {
        let base = normalize_server_url(&config.server_url)?;
        Ok(WebSocketConnector {
            ws_url: websocket_url(&base)?,
            connect_timeout: config.connect_timeout(),
        })
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn connect(&self) -> TransportResult<Box<dyn Channel>> {
        debug!("[ws] connecting to {}", self.ws_url);
        match tokio::time::timeout(self.connect_timeout, connect_async(self.ws_url.as_str()))
            .await
        {
            Ok(Ok((stream, _response))) => {
                let (tx, rx) = stream.split();
                Ok(Box::new(WebSocketChannel { tx, rx }))
            }
            Ok(Err(e)) => Err(TransportError::ConnectionFault(e.to_string())),
            Err(_) => Err(TransportError::ConnectionFault(format!(
                "connect to {} timed out after {}ms",
                self.ws_url,
                self.connect_timeout.as_millis()
            ))),
        }
    }
}
