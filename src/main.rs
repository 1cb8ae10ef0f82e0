#![forbid(unsafe_code)]

//! `field-dispatch` server binary.
//!
//! Bootstraps configuration and the store, then either serves the HTTP API
//! and realtime gateway or runs a one-shot admin command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use field_dispatch::config::GlobalConfig;
use field_dispatch::dispatch::{DispatchService, NewUser};
use field_dispatch::http::{self, AppState};
use field_dispatch::hub::EventHub;
use field_dispatch::models::user::UserRole;
use field_dispatch::persistence::db::{self, Database};
use field_dispatch::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum RoleArg {
    Manager,
    Agent,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Manager => Self::Manager,
            RoleArg::Agent => Self::Agent,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "field-dispatch", about = "Field agent dispatch server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API and realtime gateway until interrupted.
    Serve,
    /// Create a manager or agent account.
    AddUser {
        /// Unique login name.
        #[arg(long)]
        username: String,
        /// Account role.
        #[arg(long, value_enum)]
        role: RoleArg,
        /// Contact phone number.
        #[arg(long)]
        phone: Option<String>,
        /// Contact email.
        #[arg(long)]
        email: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("field-dispatch bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(open_store(&config).await?);
    info!("database connected");

    let hub = EventHub::new();
    let dispatch = DispatchService::new(db, hub.clone(), &config);

    match args.command {
        Command::Serve => serve(config, dispatch, hub).await,
        Command::AddUser {
            username,
            role,
            phone,
            email,
        } => {
            let user = dispatch
                .create_user(NewUser {
                    username,
                    role: role.into(),
                    phone,
                    email,
                })
                .await?;
            info!(user_id = %user.id, username = %user.username, "user added");
            println!("{}", user.id);
            Ok(())
        }
    }
}

async fn open_store(config: &GlobalConfig) -> Result<Database> {
    if config.uses_memory_db() {
        return db::connect_memory().await;
    }
    db::connect(&config.db_path.to_string_lossy()).await
}

async fn serve(config: Arc<GlobalConfig>, dispatch: DispatchService, hub: EventHub) -> Result<()> {
    let ct = CancellationToken::new();
    let state = AppState { config, dispatch };

    let http_ct = ct.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::serve_http(state, http_ct).await {
            error!(%err, "http server failed");
        }
    });

    info!("field-dispatch ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");

    // Closing the hub ends every realtime session.
    hub.shutdown();
    ct.cancel();

    let _ = http_handle.await;
    info!("field-dispatch shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
