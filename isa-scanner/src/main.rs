//! isa-scanner - field scanner command line
//!
//! Drives the scanner core from a terminal. The `scan` command reads
//! recognized-text frames from stdin, one frame per line, and runs each
//! through throttle → extraction → batch → submission.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use isa_common::api::{BackendClient, InventoryBackend};
use isa_common::config::{self, CliOverrides, TomlConfig};
use isa_common::events::EventBus;
use isa_common::human_time::time_ago;
use isa_common::models::{Category, NewSession, ScanMode, ScanSession, SessionFilter, SessionId};
use isa_scanner::{Discovery, ItemLifecycle, RecognizedText, ScannerController};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "isa-scanner", version, about = "Inventory label scanner")]
struct Cli {
    /// Config file (overrides ISA_CONFIG and default locations)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, global = true, env = "ISA_BACKEND_URL")]
    backend_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = "ISA_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Obtain an access token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "ISA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// List sessions
    Sessions {
        /// Include finished sessions
        #[arg(long)]
        all: bool,
    },

    /// List bills of materials
    Boms {
        #[arg(long)]
        category: Option<Category>,
    },

    /// Scan frames from stdin into a session
    Scan {
        #[command(flatten)]
        target: SessionTarget,

        /// Minimum milliseconds between processed frames (overrides config)
        #[arg(long)]
        throttle_ms: Option<u64>,

        /// End the session at EOF instead of detaching
        #[arg(long)]
        end: bool,
    },

    /// Submit one identifier by hand
    Manual {
        #[arg(long)]
        session: SessionId,
        #[arg(long)]
        identifier: String,
        #[arg(long, default_value_t = 1.0)]
        quantity: f64,
        #[arg(long)]
        po: Option<String>,
    },

    /// End an active session
    End {
        #[arg(long)]
        session: SessionId,
    },
}

#[derive(clap::Args, Debug)]
struct SessionTarget {
    /// Resume this active session
    #[arg(long, conflicts_with = "new")]
    resume: Option<SessionId>,

    /// Start a new session even if others are active
    #[arg(long)]
    new: bool,

    #[arg(long, default_value = "INVENTORY")]
    mode: ScanMode,

    #[arg(long)]
    category: Option<Category>,

    #[arg(long)]
    bom: Option<i64>,
}

impl SessionTarget {
    fn new_session(&self) -> NewSession {
        NewSession {
            mode: self.mode,
            category: self.category,
            bom_id: self.bom,
        }
    }
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
    let config = resolved.config;
    isa_common::logging::init(&config.logging)?;
    resolved.source.report();

    info!("Starting isa-scanner");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", config.backend_url);

    let client = BackendClient::from_config(&config)?;

    match cli.command {
        Command::Login { username, password } => {
            let token = client.login(&username, &password).await?;
            println!("{}", token);
        }
        Command::Sessions { all } => {
            let filter = if all { SessionFilter::default() } else { SessionFilter::active() };
            let sessions = client.list_sessions(&filter).await?;
            print_sessions(&sessions);
        }
        Command::Boms { category } => {
            let controller = controller(client, &config, None);
            for bom in controller.list_boms(category).await? {
                println!("{:>5}  {:<20}  {:<18}  {} items", bom.id, bom.name, bom.category, bom.items_count);
            }
        }
        Command::Scan { target, throttle_ms, end } => {
            let controller = controller(client, &config, throttle_ms);
            bind_session(&controller, &target).await?;
            scan_stdin(&controller).await?;
            if end {
                let session = controller.end_session().await?;
                println!("Session {} ended", session.id);
            } else {
                let session = controller.detach().await?;
                println!("Session {} left open", session.id);
            }
        }
        Command::Manual { session, identifier, quantity, po } => {
            let controller = controller(client, &config, None);
            resume_by_id(&controller, session).await?;
            let record = controller.submit_manual(&identifier, po, quantity).await?;
            println!(
                "Record {} for {}: {}",
                record.id,
                record.identifier,
                record.status.map(|s| format!("{:?}", s)).unwrap_or_else(|| "-".into())
            );
            controller.detach().await?;
        }
        Command::End { session } => {
            let controller = controller(client, &config, None);
            resume_by_id(&controller, session).await?;
            controller.end_session().await?;
            println!("Session {} ended", session);
        }
    }

    Ok(())
}

fn controller(client: BackendClient, config: &TomlConfig, throttle_ms: Option<u64>) -> ScannerController {
    let mut scanner = config.scanner.clone();
    if let Some(ms) = throttle_ms {
        scanner.throttle_interval_ms = ms;
    }
    ScannerController::new(Arc::new(client), &scanner, EventBus::new(100))
}

fn print_sessions(sessions: &[ScanSession]) {
    let now = chrono::Utc::now();
    for s in sessions {
        println!(
            "{:>5}  {:<9}  {:<18}  {:<20}  started {}{}",
            s.id,
            s.mode.to_string(),
            s.category.map(|c| c.to_string()).unwrap_or_else(|| "INVENTORY".into()),
            s.bom_name.clone().unwrap_or_default(),
            time_ago(s.started_at, now),
            if s.is_active { "" } else { " (ended)" }
        );
    }
}

/// Discover, then resume/create according to the target flags
async fn bind_session(controller: &ScannerController, target: &SessionTarget) -> Result<()> {
    if target.new {
        let session = controller.create_session(target.new_session()).await?;
        println!("Started session {}", session.id);
        return Ok(());
    }

    match controller.discover(&SessionFilter::active(), target.new_session()).await? {
        Discovery::Started(session) => {
            println!("Started session {}", session.id);
        }
        Discovery::Choose(sessions) => match target.resume {
            Some(id) => {
                controller.resume(id).await?;
                println!("Resumed session {}", id);
            }
            None => {
                println!("Active sessions:");
                print_sessions(&sessions);
                controller.cancel_choice().await?;
                bail!("pass --resume <id> to continue one of these, or --new to start fresh");
            }
        },
    }
    Ok(())
}

async fn resume_by_id(controller: &ScannerController, id: SessionId) -> Result<()> {
    let sessions = controller.find_resumable(&SessionFilter::active()).await?;
    if sessions.is_empty() {
        bail!("session {} is not active", id);
    }
    controller
        .resume(id)
        .await
        .with_context(|| format!("session {} is not active", id))?;
    Ok(())
}

async fn scan_stdin(controller: &ScannerController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if controller.on_text(RecognizedText::now(line)).await.is_none() {
            continue;
        }

        if let Err(e) = controller.capture().await {
            warn!("Capture skipped: {}", e);
            continue;
        }

        for result in controller.submit_all().await? {
            if let Err(e) = result {
                if e.is_auth_failure() {
                    bail!("backend rejected the token; run `isa-scanner login`");
                }
            }
        }

        for item in controller.batch().await {
            match &item.lifecycle {
                ItemLifecycle::Submitted { record_id, reconciliation } => println!(
                    "{}  qty {}  record {}  {}",
                    item.identifier,
                    item.quantity,
                    record_id,
                    reconciliation
                        .status
                        .map(|s| format!("{:?}", s).to_uppercase())
                        .unwrap_or_else(|| "-".into())
                ),
                ItemLifecycle::Failed { reason } => {
                    println!("{}  FAILED: {}", item.identifier, reason)
                }
                other => println!("{}  {}", item.identifier, other.name()),
            }
        }

        if controller.dismiss_batch().await.is_err() {
            // Failed items stay for inspection; drop them before the next frame
            controller.discard_batch().await?;
        }
    }

    Ok(())
}
