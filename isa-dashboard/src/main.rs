//! isa-dashboard - supervisor mirror of scanning progress
//!
//! Polls the overview, follows the live event stream and logs what changes
//! until interrupted.

use anyhow::Result;
use clap::Parser;
use isa_common::api::BackendClient;
use isa_common::config::{self, CliOverrides};
use isa_common::events::{EventBus, IsaEvent};
use isa_common::models::{ScanMode, SessionId};
use isa_dashboard::Dashboard;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "isa-dashboard", version, about = "Inventory scanning dashboard")]
struct Cli {
    /// Config file (overrides ISA_CONFIG and default locations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, env = "ISA_BACKEND_URL")]
    backend_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "ISA_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Follow the detail of this session
    #[arg(long)]
    session: Option<SessionId>,

    /// Mode of the followed session (selects the summary shape)
    #[arg(long, default_value = "INVENTORY")]
    mode: ScanMode,

    /// Poll interval in milliseconds (overrides config)
    #[arg(long)]
    poll_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = config::resolve(&CliOverrides {
        config_path: cli.config.clone(),
        backend_url: cli.backend_url.clone(),
        auth_token: cli.token.clone(),
        log_level: cli.log_level.clone(),
    });
    let mut config = resolved.config;
    if let Some(ms) = cli.poll_ms {
        config.dashboard.poll_interval_ms = ms.max(1);
    }
    isa_common::logging::init(&config.logging)?;
    resolved.source.report();

    info!("Starting isa-dashboard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", config.backend_url);

    let client = BackendClient::from_config(&config)?;
    let events = EventBus::default();
    let dashboard = Dashboard::new(Arc::new(client), config.dashboard.clone(), events.clone());

    if let Some(session_id) = cli.session {
        dashboard.select_session(session_id, cli.mode).await;
    }

    let cancel = CancellationToken::new();
    let sync = {
        let dashboard = dashboard.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dashboard.run(cancel).await })
    };
    let reporter = tokio::spawn(report(dashboard.clone(), events, cancel.clone()));

    shutdown_signal().await;
    cancel.cancel();

    if let Err(e) = sync.await {
        error!("Sync task failed: {}", e);
    }
    let _ = reporter.await;

    info!("Dashboard shutdown complete");
    Ok(())
}

/// Log mirror changes as they happen
async fn report(dashboard: Dashboard, events: EventBus, cancel: CancellationToken) {
    let mut rx = events.subscribe();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => return,
            event = rx.recv() => event,
        };

        match event {
            Ok(IsaEvent::OverviewRefreshed { active_sessions, .. }) => {
                info!(active_sessions, "Overview");
            }
            Ok(IsaEvent::DetailRefreshed { session_id, .. }) => {
                if let Some(detail) = dashboard.detail().await {
                    info!(session_id, detail = ?detail, "Session detail");
                }
            }
            Ok(IsaEvent::FeedUpdated { .. }) => {
                if let Some(record) = dashboard.feed().await.first() {
                    info!(
                        record_id = record.id,
                        identifier = %record.identifier,
                        quantity = record.quantity,
                        status = ?record.status,
                        "New scan"
                    );
                }
            }
            Ok(IsaEvent::StreamDisconnected { reason, retry_in_ms, .. }) => {
                warn!(retry_in_ms, "Live feed offline: {}", reason);
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Reporter fell behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
