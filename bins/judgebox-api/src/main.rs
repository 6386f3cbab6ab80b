mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use judgebox_core::{Executor, ExecutorConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

pub struct AppState {
    pub executor: Executor,
}

/// Listener settings, all from the environment
struct ServerConfig {
    addr: SocketAddr,
    cors_origins: Vec<String>,
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let host = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { addr, cors_origins })
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Judgebox API booting...");

    let config = ExecutorConfig::load_default().context("Failed to load executor configuration")?;
    let executor = Executor::new(config).context("Failed to initialize executor")?;
    let server = ServerConfig::from_env()?;

    let state = Arc::new(AppState { executor });
    let app = routes::router(state, &server.cors_origins);

    let listener = TcpListener::bind(server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", server.addr))?;

    info!("HTTP server listening on {}", server.addr);
    info!("Supported languages: C++, Python 3, Java");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Judgebox API shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    warn!("Received shutdown signal, finishing in-flight requests...");
}
