pub mod events;
pub mod heartbeat;
pub mod reconnect;
pub mod session;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::GatewayError;
use crate::models::presence::Presence;
use events::{opcode, GatewayMessage};
use heartbeat::Heartbeat;
use reconnect::{ReconnectPolicy, Step};
use session::SessionState;
use transport::{Received, Transport};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub token: String,
    pub presence: Presence,
    pub connect_timeout: Duration,
    /// Upper bound on a single receive; the loop re-checks shutdown after it.
    pub receive_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl GatewayConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.gateway_url.clone(),
            token: config.token.clone(),
            presence: config.presence.clone(),
            connect_timeout: CONNECT_TIMEOUT,
            receive_timeout: RECEIVE_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// How [`GatewayClient::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Shutdown,
    Exhausted { attempts: u32 },
}

/// Why a live connection ended.
#[derive(Debug)]
enum Disconnect {
    /// Server asked us to reconnect. Not a failure.
    Requested,
    Failed(GatewayError),
    Shutdown,
}

enum GatewayPhase {
    Connecting,
    Identifying(Transport),
    Monitoring(Transport, Heartbeat),
    Reconnecting(Disconnect),
    Terminated(Termination),
}

/// Keeps one gateway session alive: identify, heartbeat, and reconnect
/// until shutdown or until the reconnect policy gives up.
pub struct GatewayClient {
    config: GatewayConfig,
    state: Arc<SessionState>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig, state: Arc<SessionState>) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub async fn run(self) -> Termination {
        let mut failures: u32 = 0;
        let mut phase = GatewayPhase::Connecting;

        loop {
            phase = match phase {
                GatewayPhase::Connecting => self.connect().await,
                GatewayPhase::Identifying(mut transport) => {
                    match self.identify(&mut transport).await {
                        Ok(heartbeat) => {
                            failures = 0;
                            self.state.set_connected(true);
                            tracing::info!(
                                "identified, presence set to {} \"{}\"",
                                self.config.presence.status,
                                self.config.presence.custom_text
                            );
                            GatewayPhase::Monitoring(transport, heartbeat)
                        }
                        Err(disconnect) => {
                            transport.close().await;
                            self.after_disconnect(disconnect)
                        }
                    }
                }
                GatewayPhase::Monitoring(mut transport, heartbeat) => {
                    let disconnect = self.monitor(&mut transport, &heartbeat).await;
                    heartbeat.stop().await;
                    transport.close().await;
                    self.state.set_connected(false);
                    self.after_disconnect(disconnect)
                }
                GatewayPhase::Reconnecting(disconnect) => {
                    self.reconnect(disconnect, &mut failures).await
                }
                GatewayPhase::Terminated(termination) => {
                    self.state.set_connected(false);
                    return termination;
                }
            };
        }
    }

    async fn connect(&self) -> GatewayPhase {
        if self.state.is_shutdown_requested() {
            return GatewayPhase::Terminated(Termination::Shutdown);
        }
        tracing::info!("connecting to gateway {}", self.config.url);

        let opened = tokio::select! {
            biased;
            _ = self.state.shutdown_token().cancelled() => {
                return GatewayPhase::Terminated(Termination::Shutdown);
            }
            opened = Transport::open(&self.config.url, self.config.connect_timeout) => opened,
        };

        match opened {
            Ok(transport) => {
                self.state.reset_sequence().await;
                GatewayPhase::Identifying(transport)
            }
            Err(e) => GatewayPhase::Reconnecting(Disconnect::Failed(e.into())),
        }
    }

    /// Wait for hello, start the heartbeat, then send identify followed by
    /// the presence update.
    async fn identify(&self, transport: &mut Transport) -> Result<Heartbeat, Disconnect> {
        let hello = match self.next_message(transport).await? {
            Received::Message(message) => message,
            Received::TimedOut => {
                return Err(Disconnect::Failed(GatewayError::Protocol(format!(
                    "no hello within {:?}",
                    self.config.receive_timeout
                ))))
            }
        };
        let interval = hello.hello_interval().map_err(Disconnect::Failed)?;
        if let Some(seq) = hello.s {
            self.state.observe_sequence(seq).await;
        }
        self.state.set_heartbeat_interval(interval).await;
        tracing::info!("hello received, heartbeat every {interval:?}");

        let heartbeat = Heartbeat::start(transport.sender(), Arc::clone(&self.state), interval);

        let identify = GatewayMessage::identify(&self.config.token, self.config.presence.status);
        let presence = GatewayMessage::presence_update(&self.config.presence);
        let sent = match transport.send(&identify).await {
            Ok(()) => transport.send(&presence).await,
            Err(e) => Err(e),
        };

        if let Err(e) = sent {
            heartbeat.stop().await;
            return Err(Disconnect::Failed(e.into()));
        }
        Ok(heartbeat)
    }

    async fn monitor(&self, transport: &mut Transport, heartbeat: &Heartbeat) -> Disconnect {
        let shutdown = self.state.shutdown_token();

        loop {
            if shutdown.is_cancelled() {
                return Disconnect::Shutdown;
            }

            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Disconnect::Shutdown,
                _ = heartbeat.failed().cancelled() => {
                    return Disconnect::Failed(GatewayError::HeartbeatFailed);
                }
                received = transport.receive(self.config.receive_timeout) => received,
            };

            let message = match received {
                Ok(Received::Message(message)) => message,
                Ok(Received::TimedOut) => continue,
                Err(e) => return Disconnect::Failed(e.into()),
            };

            if let Some(seq) = message.s {
                self.state.observe_sequence(seq).await;
            }

            match message.op {
                opcode::HEARTBEAT_ACK => tracing::trace!("heartbeat acknowledged"),
                opcode::RECONNECT => return Disconnect::Requested,
                opcode::INVALID_SESSION => {
                    return Disconnect::Failed(GatewayError::InvalidSession);
                }
                opcode::HEARTBEAT => {
                    if let Err(e) = heartbeat.beat_now().await {
                        return Disconnect::Failed(e.into());
                    }
                }
                opcode::DISPATCH => {
                    if message.t.as_deref() == Some("READY") {
                        let username = message.d["user"]["username"].as_str().unwrap_or("unknown");
                        if self.state.record_ready() == 1 {
                            tracing::info!("gateway session ready for {username}");
                        } else {
                            tracing::debug!("gateway session ready again for {username}");
                        }
                    }
                }
                other => tracing::debug!("ignoring gateway op {other}"),
            }
        }
    }

    async fn next_message(&self, transport: &mut Transport) -> Result<Received, Disconnect> {
        tokio::select! {
            biased;
            _ = self.state.shutdown_token().cancelled() => Err(Disconnect::Shutdown),
            received = transport.receive(self.config.receive_timeout) => {
                received.map_err(|e| Disconnect::Failed(e.into()))
            }
        }
    }

    fn after_disconnect(&self, disconnect: Disconnect) -> GatewayPhase {
        match disconnect {
            Disconnect::Shutdown => GatewayPhase::Terminated(Termination::Shutdown),
            other => GatewayPhase::Reconnecting(other),
        }
    }

    async fn reconnect(&self, disconnect: Disconnect, failures: &mut u32) -> GatewayPhase {
        let error = match disconnect {
            Disconnect::Shutdown => return GatewayPhase::Terminated(Termination::Shutdown),
            Disconnect::Requested => {
                tracing::info!("gateway requested a reconnect");
                return GatewayPhase::Connecting;
            }
            Disconnect::Failed(error) => error,
        };

        match self.config.reconnect.after_failure(*failures) {
            Step::GiveUp { attempts } => {
                *failures = attempts;
                tracing::error!("connection error: {error}");
                tracing::error!("max retries ({attempts}) reached, giving up");
                GatewayPhase::Terminated(Termination::Exhausted { attempts })
            }
            Step::Retry { attempt, delay } => {
                *failures = attempt;
                tracing::warn!("connection error: {error}");
                tracing::warn!(
                    "retrying in {delay:?} (attempt {attempt}/{})",
                    self.config.reconnect.max_attempts
                );
                tokio::select! {
                    biased;
                    _ = self.state.shutdown_token().cancelled() => {
                        GatewayPhase::Terminated(Termination::Shutdown)
                    }
                    _ = tokio::time::sleep(delay) => GatewayPhase::Connecting,
                }
            }
        }
    }
}
