use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use presence_keeper::api_client::ApiClient;
use presence_keeper::config::{self, Config};
use presence_keeper::gateway::session::SessionState;
use presence_keeper::models::presence::PresenceStatus;
use presence_keeper::{keep_alive, startup};

/// Keep an account online with a custom status.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Presence status: online, dnd or idle (overrides PRESENCE_STATUS)
    #[arg(long)]
    status: Option<PresenceStatus>,

    /// Custom status text (overrides CUSTOM_STATUS)
    #[arg(long)]
    custom_status: Option<String>,

    /// Display name to set at startup; empty to skip (overrides DISPLAY_NAME)
    #[arg(long)]
    display_name: Option<String>,

    /// Do not start the keep-alive HTTP server
    #[arg(long)]
    no_keep_alive: bool,

    /// Keep-alive HTTP port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(status) = self.status {
            config.presence.status = status;
        }
        if let Some(text) = self.custom_status {
            config.presence.custom_text = text;
        }
        if let Some(name) = self.display_name {
            config.display_name = Some(name).filter(|n| !n.trim().is_empty());
        }
        if self.no_keep_alive {
            config.keep_alive = false;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_file = config::load_env_file();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presence_keeper=info,tower_http=info".into()),
        )
        .init();

    if let Some(path) = env_file {
        tracing::debug!("loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);
    print_banner(&config);

    let shutdown = CancellationToken::new();
    let state = Arc::new(SessionState::new(shutdown.clone()));

    // Installed before any network call.
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        keep_alive::shutdown_signal().await;
        tracing::warn!("shutting down...");
        signal_token.cancel();
    });

    let keep_alive_handle = config.keep_alive.then(|| {
        tokio::spawn(keep_alive::serve(
            config.port,
            Arc::clone(&state),
            shutdown.clone(),
        ))
    });

    let api = ApiClient::new(config.api_base_url.clone(), config.token.clone());
    let outcome = startup::run(&config, &api, state, &shutdown).await;

    shutdown.cancel();
    if let Some(handle) = keep_alive_handle {
        let _ = handle.await;
    }

    if outcome.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    let display_name = config.display_name.as_deref().unwrap_or("(unchanged)");

    eprintln!();
    eprintln!("  \x1b[1;36mpresence-keeper\x1b[0m \x1b[2mv{version}\x1b[0m");
    eprintln!();
    eprintln!("  \x1b[2mstatus\x1b[0m       {}", config.presence.status);
    eprintln!("  \x1b[2mcustom\x1b[0m       {}", config.presence.custom_text);
    eprintln!("  \x1b[2mname\x1b[0m         {display_name}");
    eprintln!("  \x1b[2mgateway\x1b[0m      {}", config.gateway_url);

    if config.keep_alive {
        eprintln!("  \x1b[2mkeep-alive\x1b[0m   0.0.0.0:{}", config.port);
    }

    eprintln!();
}
