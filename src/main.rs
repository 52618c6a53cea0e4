//! Demo binary: assemble a server from a TOML overlay plus CLI overrides.
//!
//! ```text
//! chassis [--config server.toml] [--host 0.0.0.0] [--port 3000]
//! ```
//!
//! Mounts two sample routes so the assembled pipeline has something to
//! serve, then runs until Ctrl+C and drains before exiting.

use std::path::PathBuf;

use axum::response::Json;
use axum::routing::get;
use axum::{Extension, Router};
use clap::Parser;

use chassis::observability::{logging, metrics};
use chassis::{EnvSnapshot, Result, ServerConfig, Session, WebServer};

#[derive(Parser, Debug)]
#[command(name = "chassis", version, about = "Configurable web server assembly")]
struct Args {
    /// TOML configuration overlay.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvSnapshot::capture();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_toml_file(path, env)?,
        None => ServerConfig::with_env(env),
    };
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.host,
        port = config.port,
        "chassis starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    config.routes = Some(sample_routes());

    let mut server = WebServer::new(config)?;
    server.listen().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.close().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn sample_routes() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
}

async fn home(Extension(session): Extension<Session>) -> String {
    let visits = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
    session.insert("visits", serde_json::json!(visits));
    format!("Welcome, visit number {visits}\n")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
