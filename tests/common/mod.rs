#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use presence_keeper::gateway::reconnect::ReconnectPolicy;
use presence_keeper::gateway::session::SessionState;
use presence_keeper::gateway::{GatewayClient, GatewayConfig, Termination};
use presence_keeper::models::presence::{Presence, PresenceStatus};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

pub const TEST_TOKEN: &str = "test-token";
pub const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Mock gateway
// ---------------------------------------------------------------------------

/// One step of a scripted server-side connection.
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a hello with the given heartbeat interval in milliseconds.
    Hello(u64),
    Send(Value),
    Raw(String),
    /// Wait until the client has sent a message with this opcode.
    WaitFor(u8),
    Sleep(Duration),
    /// Close handshake, then wait for the client to go away.
    Close,
    /// Drop the TCP connection without a close frame.
    Drop,
    /// Keep the connection open until the client closes it.
    Hold,
}

#[derive(Debug, Clone)]
pub enum Event {
    Connected { conn: usize, at: Instant },
    HelloSent { conn: usize, at: Instant },
    Received { conn: usize, at: Instant, msg: Value },
    Disconnected { conn: usize, at: Instant },
}

/// A loopback gateway that plays one script per accepted connection. The
/// last script is reused once the list runs out.
pub struct MockGateway {
    pub url: String,
    pub connections: Arc<AtomicUsize>,
    events: mpsc::UnboundedReceiver<Event>,
    history: Vec<Event>,
}

impl MockGateway {
    pub async fn spawn(scripts: Vec<Vec<Action>>) -> Self {
        assert!(!scripts.is_empty(), "at least one script is required");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let accepted = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let conn = accepted.fetch_add(1, Ordering::SeqCst);
                let script = scripts[conn.min(scripts.len() - 1)].clone();
                tokio::spawn(play(conn, stream, script, tx.clone()));
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{}", addr.port()),
            connections,
            events: rx,
            history: Vec::new(),
        }
    }

    async fn next_event(&mut self, deadline: Instant) -> Event {
        let event = tokio::time::timeout_at(deadline, self.events.recv())
            .await
            .expect("timed out waiting for mock gateway event")
            .expect("mock gateway stopped");
        self.history.push(event.clone());
        event
    }

    /// Wait for a client message on `conn` that satisfies `pred`.
    pub async fn wait_for_message(
        &mut self,
        conn: usize,
        within: Duration,
        pred: impl Fn(&Value) -> bool,
    ) -> (Value, Instant) {
        let deadline = Instant::now() + within;
        for event in &self.history {
            if let Event::Received { conn: c, at, msg } = event {
                if *c == conn && pred(msg) {
                    return (msg.clone(), *at);
                }
            }
        }
        loop {
            if let Event::Received { conn: c, at, msg } = self.next_event(deadline).await {
                if c == conn && pred(&msg) {
                    return (msg, at);
                }
            }
        }
    }

    /// Wait for the `nth` (0-based) client message with opcode `op` on `conn`.
    pub async fn wait_for_nth(&mut self, conn: usize, op: u64, nth: usize) -> (Value, Instant) {
        let deadline = Instant::now() + WAIT;
        loop {
            let found: Vec<(Value, Instant)> = self
                .history
                .iter()
                .filter_map(|e| match e {
                    Event::Received { conn: c, at, msg } if *c == conn && msg["op"] == op => {
                        Some((msg.clone(), *at))
                    }
                    _ => None,
                })
                .collect();
            if let Some(hit) = found.into_iter().nth(nth) {
                return hit;
            }
            self.next_event(deadline).await;
        }
    }

    pub async fn wait_for(&mut self, conn: usize, op: u64) -> Value {
        self.wait_for_message(conn, WAIT, |m| m["op"] == op).await.0
    }

    pub async fn wait_disconnected(&mut self, conn: usize) -> Instant {
        let deadline = Instant::now() + WAIT;
        for event in &self.history {
            if let Event::Disconnected { conn: c, at } = event {
                if *c == conn {
                    return *at;
                }
            }
        }
        loop {
            if let Event::Disconnected { conn: c, at } = self.next_event(deadline).await {
                if c == conn {
                    return at;
                }
            }
        }
    }

    pub fn hello_sent_at(&self, conn: usize) -> Option<Instant> {
        self.history.iter().find_map(|e| match e {
            Event::HelloSent { conn: c, at } if *c == conn => Some(*at),
            _ => None,
        })
    }

    /// Pull in everything received so far without waiting.
    pub fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.history.push(event);
        }
    }

    /// Opcodes of all client messages seen on `conn`, in arrival order.
    pub fn client_ops(&mut self, conn: usize) -> Vec<u64> {
        self.drain();
        self.history
            .iter()
            .filter_map(|e| match e {
                Event::Received { conn: c, msg, .. } if *c == conn => msg["op"].as_u64(),
                _ => None,
            })
            .collect()
    }

    /// Client messages seen on `conn` with opcode `op`.
    pub fn client_messages(&mut self, conn: usize, op: u64) -> Vec<Value> {
        self.drain();
        self.history
            .iter()
            .filter_map(|e| match e {
                Event::Received { conn: c, msg, .. } if *c == conn && msg["op"] == op => {
                    Some(msg.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn play(conn: usize, stream: TcpStream, script: Vec<Action>, tx: mpsc::UnboundedSender<Event>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let _ = tx.send(Event::Connected {
        conn,
        at: Instant::now(),
    });
    let (mut sink, mut stream) = ws.split();

    let (op_tx, mut op_rx) = mpsc::unbounded_channel::<u64>();
    let reader_tx = tx.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                        let op = value["op"].as_u64().unwrap_or(u64::MAX);
                        let _ = reader_tx.send(Event::Received {
                            conn,
                            at: Instant::now(),
                            msg: value,
                        });
                        let _ = op_tx.send(op);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = reader_tx.send(Event::Disconnected {
            conn,
            at: Instant::now(),
        });
    });

    for action in script {
        match action {
            Action::Hello(interval) => {
                let hello = json!({ "op": 10, "d": { "heartbeat_interval": interval } });
                if sink.send(Message::Text(hello.to_string().into())).await.is_err() {
                    break;
                }
                let _ = tx.send(Event::HelloSent {
                    conn,
                    at: Instant::now(),
                });
            }
            Action::Send(value) => {
                if sink.send(Message::Text(value.to_string().into())).await.is_err() {
                    break;
                }
            }
            Action::Raw(text) => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Action::WaitFor(op) => loop {
                match op_rx.recv().await {
                    Some(got) if got == u64::from(op) => break,
                    Some(_) => continue,
                    None => return,
                }
            },
            Action::Sleep(duration) => tokio::time::sleep(duration).await,
            Action::Close => {
                let _ = sink.close().await;
                break;
            }
            Action::Drop => {
                reader.abort();
                return;
            }
            Action::Hold => break,
        }
    }

    let _ = reader.await;
}

/// A listener that accepts TCP connections and drops them before the
/// WebSocket handshake. Returns the URL and an accept counter.
pub async fn spawn_refusing_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });
    (format!("ws://127.0.0.1:{}", addr.port()), accepted)
}

// ---------------------------------------------------------------------------
// Client helpers
// ---------------------------------------------------------------------------

pub fn test_presence() -> Presence {
    Presence {
        status: PresenceStatus::Dnd,
        custom_text: "Testing".to_string(),
    }
}

/// Gateway config with millisecond-scale backoff and a long receive timeout.
pub fn gateway_config(url: &str) -> GatewayConfig {
    GatewayConfig {
        url: url.to_string(),
        token: TEST_TOKEN.to_string(),
        presence: test_presence(),
        connect_timeout: Duration::from_secs(2),
        receive_timeout: Duration::from_secs(30),
        reconnect: ReconnectPolicy {
            max_attempts: 5,
            step: Duration::from_millis(10),
            cap: Duration::from_millis(30),
        },
    }
}

pub struct RunningClient {
    pub shutdown: CancellationToken,
    pub state: Arc<SessionState>,
    pub handle: JoinHandle<Termination>,
}

impl RunningClient {
    pub async fn stop(self) -> Termination {
        self.shutdown.cancel();
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("gateway client did not stop")
            .unwrap()
    }
}

pub fn start_client(config: GatewayConfig) -> RunningClient {
    let shutdown = CancellationToken::new();
    let state = Arc::new(SessionState::new(shutdown.clone()));
    let client = GatewayClient::new(config, Arc::clone(&state));
    let handle = tokio::spawn(client.run());
    RunningClient {
        shutdown,
        state,
        handle,
    }
}

// ---------------------------------------------------------------------------
// Mock REST API
// ---------------------------------------------------------------------------

/// Serve `app` on a loopback port and return its base URL.
pub async fn spawn_api(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", addr.port())
}
