//! Handraise server binary.
//!
//! # Usage
//!
//! ```bash
//! # In-memory storage (development)
//! handraise-server --bind 0.0.0.0:8080
//!
//! # Durable storage (production)
//! handraise-server --bind 0.0.0.0:8080 --db /var/lib/handraise/rooms.redb
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use handraise_server::{
    Hub, HubConfig, SystemEnv,
    store::{MemoryStore, QuestionStore, RedbStore},
    ws,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Handraise room broadcast server
#[derive(Parser, Debug)]
#[command(name = "handraise-server")]
#[command(about = "Real-time classroom Q&A room server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Path to the redb database file; omit for in-memory storage
    #[arg(long)]
    db: Option<PathBuf>,

    /// Maximum concurrent sessions
    #[arg(long, default_value = "10000")]
    max_sessions: usize,

    /// Vote lock acquisition timeout in seconds
    #[arg(long, default_value = "5")]
    vote_lock_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Handraise server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = HubConfig {
        vote_lock_timeout: Duration::from_secs(args.vote_lock_timeout_secs),
        max_sessions: args.max_sessions,
        ..Default::default()
    };

    match &args.db {
        Some(path) => {
            let store = RedbStore::open(path)?;
            tracing::info!("Using redb storage at {}", path.display());
            run(store, config, &args.bind).await
        },
        None => {
            tracing::warn!("No --db given - rooms will not survive a restart");
            run(MemoryStore::new(), config, &args.bind).await
        },
    }
}

async fn run<S: QuestionStore>(
    store: S,
    config: HubConfig,
    bind: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let restored = store.list_rooms()?;
    if !restored.is_empty() {
        tracing::info!("Restored {} room(s) from storage", restored.len());
    }

    let hub = Arc::new(Hub::new(SystemEnv::new(), store, config));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, ws::router(hub)).await?;

    Ok(())
}
