use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// State shared between the gateway loop, its heartbeat task and the
/// keep-alive endpoint. The gateway loop is the only writer.
#[derive(Debug)]
pub struct SessionState {
    last_sequence: RwLock<Option<u64>>,
    heartbeat_interval: RwLock<Option<Duration>>,
    connected: AtomicBool,
    ready_sessions: AtomicU32,
    shutdown: CancellationToken,
}

impl SessionState {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            last_sequence: RwLock::new(None),
            heartbeat_interval: RwLock::new(None),
            connected: AtomicBool::new(false),
            ready_sessions: AtomicU32::new(0),
            shutdown,
        }
    }

    pub async fn last_sequence(&self) -> Option<u64> {
        *self.last_sequence.read().await
    }

    /// Record a sequence number from an inbound message. Values lower than
    /// the current one are ignored. Returns whether the value advanced.
    pub async fn observe_sequence(&self, seq: u64) -> bool {
        let mut current = self.last_sequence.write().await;
        match *current {
            Some(prev) if seq < prev => {
                tracing::debug!("ignoring out-of-order sequence {seq} (last {prev})");
                false
            }
            _ => {
                *current = Some(seq);
                true
            }
        }
    }

    /// Forget the sequence. Called when a new connection is opened.
    pub async fn reset_sequence(&self) {
        *self.last_sequence.write().await = None;
    }

    pub async fn heartbeat_interval(&self) -> Option<Duration> {
        *self.heartbeat_interval.read().await
    }

    pub async fn set_heartbeat_interval(&self, interval: Duration) {
        *self.heartbeat_interval.write().await = Some(interval);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Count a READY dispatch. Returns how many sessions have become ready
    /// so far, this one included.
    pub fn record_ready(&self) -> u32 {
        self.ready_sessions.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn ready_sessions(&self) -> u32 {
        self.ready_sessions.load(Ordering::Relaxed)
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_starts_unknown() {
        let state = SessionState::new(CancellationToken::new());
        assert_eq!(state.last_sequence().await, None);
    }

    #[tokio::test]
    async fn test_sequence_is_monotonic() {
        let state = SessionState::new(CancellationToken::new());
        assert!(state.observe_sequence(3).await);
        assert!(state.observe_sequence(5).await);
        assert!(!state.observe_sequence(4).await);
        assert_eq!(state.last_sequence().await, Some(5));
        assert!(state.observe_sequence(5).await);
        assert_eq!(state.last_sequence().await, Some(5));
    }

    #[tokio::test]
    async fn test_reset_sequence() {
        let state = SessionState::new(CancellationToken::new());
        state.observe_sequence(9).await;
        state.reset_sequence().await;
        assert_eq!(state.last_sequence().await, None);
        assert!(state.observe_sequence(1).await);
    }

    #[test]
    fn test_ready_sessions_are_counted() {
        let state = SessionState::new(CancellationToken::new());
        assert_eq!(state.ready_sessions(), 0);
        assert_eq!(state.record_ready(), 1);
        assert_eq!(state.record_ready(), 2);
        assert_eq!(state.ready_sessions(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_is_shared_with_token() {
        let token = CancellationToken::new();
        let state = SessionState::new(token.clone());
        assert!(!state.is_shutdown_requested());
        state.request_shutdown();
        assert!(token.is_cancelled());
        assert!(state.is_shutdown_requested());
    }
}
