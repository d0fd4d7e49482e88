//! ecole-srv - school registry REST service
//!
//! Serves the registry, affectation and recouvrement endpoints from a SQLite
//! database kept in the root folder.

use anyhow::{Context, Result};
use clap::Parser;
use ecole_common::config::{load_config, RootFolderInitializer, RootFolderResolver};
use ecole_common::db::init_database;
use ecole_srv::{build_router, AppState};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ecole-srv", version, about = "School registry REST service")]
struct Args {
    /// TOML config file (default: ~/.config/ecole/config.toml, then /etc/ecole/config.toml)
    #[arg(long, env = "ECOLE_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding ecole.db
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Do not serve the ensure/ endpoints; they answer 404
    #[arg(long)]
    no_ensure: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting École server (ecole-srv) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.as_deref())
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match init_database(&db_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let ensure_endpoints = config.server.ensure_endpoints && !args.no_ensure;
    if !ensure_endpoints {
        warn!("Ensure endpoints disabled; clients fall back to create + lookup");
    }

    let state = AppState::new(pool, ensure_endpoints);
    let app = build_router(state);

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("ecole-srv listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
