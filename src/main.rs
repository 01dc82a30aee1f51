use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;

use burnnote::clock::SystemClock;
use burnnote::config::BurnnoteConfig;
use burnnote::handlers::NoteHandlers;
use burnnote::logging;
use burnnote::note::NoteService;
use burnnote::store::SqliteNoteStore;

/// Maintenance daemon for a Burnnote note store.
///
/// Applies the schema, then deletes expired notes and stale rate limit
/// windows on an interval.
#[derive(Debug, Parser)]
#[command(name = "burnnote", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured database URL
    #[arg(long)]
    database_url: Option<String>,

    /// Purge expired notes once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = BurnnoteConfig::load(args.config.as_deref())?;
    if let Some(url) = args.database_url {
        config.store.database_url = url;
    }

    logging::init(&config.logging)?;

    info!("Starting Burnnote");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        database_url = %config.store.database_url,
        creation_policy = ?config.notes.creation_policy,
        "Configuration loaded"
    );

    let store = Arc::new(
        SqliteNoteStore::connect(&config.store.database_url, config.store.max_connections).await?,
    );
    let service = Arc::new(
        NoteService::new(store.clone(), Arc::new(SystemClock))
            .with_key_attempts(config.notes.key_attempts),
    );
    let handlers = Arc::new(NoteHandlers::from_config(service, &config)?);
    info!(
        create = ?handlers.limiter().rules().create,
        view = ?handlers.limiter().rules().view,
        max_tracked_keys = handlers.limiter().max_tracked_keys(),
        "Rate limit rules loaded"
    );

    let removed = handlers.sweep().await?;
    info!(removed, "Initial sweep complete");

    if args.once {
        store.close().await;
        return Ok(());
    }

    let interval = Duration::from_secs(config.store.sweep_interval_secs.max(1));
    info!(interval_secs = interval.as_secs(), "Starting expired note sweeper");
    let sweeper = Arc::clone(&handlers).spawn_sweeper(interval);

    shutdown_signal().await;

    sweeper.abort();
    store.close().await;
    info!("Burnnote stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
