//! Blog backend server.
//!
//! Opens the database and the key-value store, then serves the HTTP API
//! until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Error, anyhow};
use blog_core::db::Database;
use blog_core::store::{KvStore, MemoryStore, RedisStore};
use blog_server::{api, config::ServerConfig, logging, metrics};
use log::{info, warn};
use pico_args::Arguments;

const HELP: &str = "\
Run the blog backend server

USAGE:
  blog_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or sqlite://blog.db?mode=rwc]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             SQLite connection string
  REDIS_URL                Redis URL; an in-process store is used when unset
  JWT_SECRET               JWT signing secret (required)
  PASSWORD_PEPPER          Password hashing pepper (required)
  UPLOAD_DIR               Directory for uploaded images [default: ./img]
  METRICS_BIND             Prometheus listener address (optional)
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus metrics exported on {}", addr);
    }

    info!("Connecting to database: {}", config.database.database_url);
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;
    db.migrate()
        .await
        .map_err(|e| anyhow!("Failed to apply migrations: {}", e))?;
    info!("Database connected successfully");

    let store: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url)
                .await
                .map_err(|e| anyhow!("Failed to connect to Redis: {}", e))?;
            info!("Connected to Redis");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set, sessions and verification codes are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    tokio::fs::create_dir_all(&config.uploads.dir)
        .await
        .map_err(|e| anyhow!("Failed to create {}: {}", config.uploads.dir.display(), e))?;

    let state = api::AppState::from_config(&config, db.clone(), store);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
