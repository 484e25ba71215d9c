use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::gateway::session::SessionState;

async fn alive() -> &'static str {
    "Alive"
}

async fn health(State(state): State<Arc<SessionState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connected": state.is_connected(),
        "last_sequence": state.last_sequence().await,
    }))
}

/// Minimal HTTP endpoint for hosts that stop processes with no open port.
pub fn router(state: Arc<SessionState>) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the keep-alive router until `shutdown` fires. Bind failures are
/// logged; they never take the gateway down with them.
pub async fn serve(port: u16, state: Arc<SessionState>, shutdown: CancellationToken) {
    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("keep-alive server failed to bind port {port}: {e}");
            return;
        }
    };
    tracing::info!("keep-alive server listening on 0.0.0.0:{port}");

    let app = router(state);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        tracing::error!("keep-alive server error: {e}");
    }
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
