use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::events::GatewayMessage;
use super::session::SessionState;
use super::transport::TransportSender;
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// Stopped on request or because shutdown was observed.
    Stopped,
    /// A heartbeat could not be sent; the connection is considered dead.
    SendFailed,
}

/// Periodic heartbeat bound to one transport. Exactly one per live
/// connection; [`Heartbeat::stop`] must be awaited before the transport is
/// closed.
pub struct Heartbeat {
    sender: TransportSender,
    state: Arc<SessionState>,
    stop: CancellationToken,
    failed: CancellationToken,
    handle: Option<JoinHandle<HeartbeatExit>>,
}

impl Heartbeat {
    /// Spawn the heartbeat task. The first beat goes out one full
    /// `interval` after this call.
    pub fn start(sender: TransportSender, state: Arc<SessionState>, interval: Duration) -> Self {
        let stop = state.shutdown_token().child_token();
        let failed = CancellationToken::new();

        let handle = tokio::spawn(run(
            sender.clone(),
            Arc::clone(&state),
            interval,
            stop.clone(),
            failed.clone(),
        ));

        Self {
            sender,
            state,
            stop,
            failed,
            handle: Some(handle),
        }
    }

    /// Cancelled once a heartbeat send has failed.
    pub fn failed(&self) -> &CancellationToken {
        &self.failed
    }

    /// Send one heartbeat right away, outside the regular schedule. Used
    /// when the gateway asks for a beat.
    pub async fn beat_now(&self) -> Result<(), TransportError> {
        if self.stop.is_cancelled() {
            return Ok(());
        }
        let seq = self.state.last_sequence().await;
        self.sender.send(&GatewayMessage::heartbeat(seq)).await
    }

    /// Signal the task to stop and wait for it to finish. Nothing is sent
    /// on the transport by this heartbeat once this returns.
    pub async fn stop(mut self) -> HeartbeatExit {
        self.stop.cancel();
        let Some(handle) = self.handle.take() else {
            return HeartbeatExit::Stopped;
        };
        match handle.await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::warn!("heartbeat task ended abnormally: {e}");
                HeartbeatExit::Stopped
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn run(
    sender: TransportSender,
    state: Arc<SessionState>,
    interval: Duration,
    stop: CancellationToken,
    failed: CancellationToken,
) -> HeartbeatExit {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return HeartbeatExit::Stopped,
            _ = ticker.tick() => {}
        }

        let seq = state.last_sequence().await;
        if stop.is_cancelled() {
            return HeartbeatExit::Stopped;
        }

        match sender.send(&GatewayMessage::heartbeat(seq)).await {
            Ok(()) => tracing::debug!("heartbeat sent (seq {seq:?})"),
            Err(_) if stop.is_cancelled() => return HeartbeatExit::Stopped,
            Err(e) => {
                tracing::warn!("heartbeat failed: {e}");
                failed.cancel();
                return HeartbeatExit::SendFailed;
            }
        }
    }
}
