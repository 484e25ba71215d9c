use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::events::GatewayMessage;
use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outcome of a bounded receive.
#[derive(Debug)]
pub enum Received {
    Message(GatewayMessage),
    TimedOut,
}

/// Cloneable send half of a transport. Shared with the heartbeat task.
#[derive(Clone)]
pub struct TransportSender {
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    closed: Arc<AtomicBool>,
}

impl TransportSender {
    pub async fn send(&self, message: &GatewayMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let text =
            serde_json::to_string(message).map_err(|e| TransportError::Send(e.to_string()))?;

        let mut sink = self.sink.lock().await;
        // close() may have won the lock race.
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        sink.send(Message::Text(text.into())).await.map_err(|e| match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed
            }
            other => TransportError::Send(other.to_string()),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            tracing::debug!("error while closing gateway socket: {e}");
        }
    }
}

/// One gateway connection. Not reusable once closed.
pub struct Transport {
    sender: TransportSender,
    stream: SplitStream<WsStream>,
}

impl Transport {
    pub async fn open(url: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let (ws, _) = tokio::time::timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                TransportError::Connect(format!("timed out after {connect_timeout:?}"))
            })?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (sink, stream) = ws.split();
        Ok(Self {
            sender: TransportSender {
                sink: Arc::new(Mutex::new(sink)),
                closed: Arc::new(AtomicBool::new(false)),
            },
            stream,
        })
    }

    pub fn sender(&self) -> TransportSender {
        self.sender.clone()
    }

    pub async fn send(&self, message: &GatewayMessage) -> Result<(), TransportError> {
        self.sender.send(message).await
    }

    /// Wait up to `timeout` for the next gateway message. Control frames
    /// are skipped; an expired timeout is not an error.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Received, TransportError> {
        if self.sender.is_closed() {
            return Err(TransportError::Closed);
        }
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let next = match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(Received::TimedOut),
            };

            match next {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<GatewayMessage>(text.as_str())
                        .map(Received::Message)
                        .map_err(|e| TransportError::Decode(e.to_string()));
                }
                Some(Ok(Message::Close(frame))) => {
                    match frame {
                        Some(frame) => tracing::info!(
                            "gateway closed the connection ({}: {})",
                            u16::from(frame.code),
                            frame.reason.as_str()
                        ),
                        None => tracing::info!("gateway closed the connection"),
                    }
                    self.sender.closed.store(true, Ordering::SeqCst);
                    return Err(TransportError::Closed);
                }
                Some(Ok(_)) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed))
                | None => {
                    self.sender.closed.store(true, Ordering::SeqCst);
                    return Err(TransportError::Closed);
                }
                Some(Err(e)) => {
                    self.sender.closed.store(true, Ordering::SeqCst);
                    return Err(TransportError::Receive(e.to_string()));
                }
            }
        }
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&mut self) {
        self.sender.close().await;
    }
}
