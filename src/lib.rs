pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod triage;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServiceConfig};
use crate::core_state::CoreState;
use crate::notify::NotificationDispatcher;

/// Startup failures. Anything after the server is up is logged instead.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Identity error: {0}")]
    Identity(#[from] identity::IdentityError),
    #[error("Server error: {0}")]
    Server(#[from] api::ServerError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Debug, Parser)]
#[command(name = "vetcare", version)]
#[command(about = "Vet appointment scheduling and symptom triage service")]
pub struct Cli {
    /// Serve the API when no command is given
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a new bearer credential for an existing user
    IssueToken {
        /// Id of the user the credential resolves to
        user_id: String,
    },
    /// Revoke a bearer credential so it no longer resolves
    RevokeToken {
        /// The credential as printed by `issue-token`
        token: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Binary entry point: `vetcare` serves the API; `issue-token` and
/// `revoke-token` manage bearer credentials in the service database.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = ServiceConfig::from_env()?;
    match cli.command {
        None => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve(cfg))
        }
        Some(Command::IssueToken { user_id }) => {
            let conn = open_service_db(&cfg)?;
            let token = identity::issue_token(&conn, &user_id)?;
            println!("{token}");
            Ok(())
        }
        Some(Command::RevokeToken { token }) => {
            let conn = open_service_db(&cfg)?;
            if identity::revoke_token(&conn, &token)? {
                tracing::info!("Credential revoked");
            } else {
                tracing::warn!("Credential not found or already revoked");
            }
            Ok(())
        }
    }
}

fn open_service_db(cfg: &ServiceConfig) -> Result<rusqlite::Connection, AppError> {
    if let Some(parent) = cfg.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(db::open_database(&cfg.db_path)?)
}

/// Run the API until Ctrl-C, then drain pending notifications.
pub async fn serve(cfg: ServiceConfig) -> Result<(), AppError> {
    tracing::info!(
        "{} starting v{} (policy {})",
        config::APP_NAME,
        config::APP_VERSION,
        cfg.conflict_policy
    );

    // Migrate once up front so request connections find the schema.
    drop(open_service_db(&cfg)?);

    let (dispatcher, rx) = NotificationDispatcher::channel();
    let delivery = notify::spawn_delivery(rx, cfg.db_path.clone());

    let core = Arc::new(CoreState::new(
        cfg.db_path.clone(),
        cfg.conflict_policy,
        Arc::new(dispatcher),
    ));
    let mut server = api::start_server(core.clone(), cfg.bind, cfg.rate_per_minute).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    server.shutdown();
    server.stopped().await;

    // Last dispatcher clone lives in `core`; dropping it closes the queue.
    drop(core);
    let delivered = delivery.finish().await;
    tracing::info!(delivered, "{} stopped", config::APP_NAME);
    Ok(())
}
