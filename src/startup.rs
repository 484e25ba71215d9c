use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api_client::{ApiClient, DisplayNameUpdate};
use crate::config::Config;
use crate::gateway::session::SessionState;
use crate::gateway::{GatewayClient, GatewayConfig, Termination};

/// Pause between token validation and the profile update.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How the process run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Interrupted, at any point of startup or while connected.
    Shutdown,
    /// The gateway reconnect policy gave up.
    Exhausted { attempts: u32 },
    /// The token was rejected or could not be checked.
    InvalidToken,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::InvalidToken)
    }
}

/// Run `fut` unless `shutdown` fires first.
async fn unless_shutdown<F: Future>(shutdown: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Validate the token, apply the display name, then keep the gateway
/// session alive. Every step stops as soon as `shutdown` is cancelled.
pub async fn run(
    config: &Config,
    api: &ApiClient,
    state: Arc<SessionState>,
    shutdown: &CancellationToken,
) -> Outcome {
    let Some(identity) = unless_shutdown(shutdown, api.validate_token()).await else {
        return Outcome::Shutdown;
    };
    let identity = match identity {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!("token validation failed: {e}");
            return Outcome::InvalidToken;
        }
    };
    tracing::info!("logged in as {} ({})", identity.username, identity.id);

    if unless_shutdown(shutdown, tokio::time::sleep(SETTLE_DELAY))
        .await
        .is_none()
    {
        return Outcome::Shutdown;
    }

    if let Some(ref name) = config.display_name {
        match unless_shutdown(shutdown, api.update_display_name(name)).await {
            None => return Outcome::Shutdown,
            Some(Ok(DisplayNameUpdate::Updated)) => {
                tracing::info!("display name updated to {name}")
            }
            Some(Ok(DisplayNameUpdate::Rejected(reason))) => {
                tracing::warn!("display name rejected: {reason}, continuing without it");
            }
            Some(Err(e)) => {
                tracing::warn!("failed to update display name: {e}, continuing without it");
            }
        }
    }

    let client = GatewayClient::new(GatewayConfig::from_config(config), state);
    match client.run().await {
        Termination::Shutdown => {
            tracing::info!("gateway stopped");
            Outcome::Shutdown
        }
        Termination::Exhausted { attempts } => {
            tracing::error!("gave up on the gateway after {attempts} failed attempts, exiting");
            Outcome::Exhausted { attempts }
        }
    }
}
