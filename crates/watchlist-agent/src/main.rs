use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::SignalKind;
use watchlist_gateway::HttpGateway;
use watchlist_sync::WatchlistSession;

mod config;
mod console;
mod render;

use config::AgentConfig;
use console::Command;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!("Starting watchlist agent");

    // 2. Load configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  API: {}", config.gateway.base_url);
    tracing::info!("  User: {}", config.user_id);
    tracing::info!("  Refresh interval: {:?}", config.sync.refresh_interval);
    tracing::info!("  Request timeout: {:?}", config.sync.request_timeout);
    tracing::info!(
        "  Quote endpoint: /{}/{{ticker}}",
        config.gateway.quote_endpoint.path_segment()
    );

    // 3. Wire gateway, session and render sink
    let gateway =
        Arc::new(HttpGateway::new(config.gateway.clone()).context("Failed to build HTTP gateway")?);
    let session = WatchlistSession::new(gateway, config.user_id.clone(), config.sync.clone());
    let renderer = tokio::spawn(render::run(session.subscribe()));

    // 4. Initial load, falls back to seed data
    let source = session.load().await;
    tracing::info!("Watchlist ready ({:?})", source);
    render::print_help();

    // 5. Console loop with graceful shutdown (SIGINT + SIGTERM)
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match console::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => console::execute(&session, command).await,
                    Err(e) => render::print_error(&e),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    session.shutdown().await;
    renderer.abort();
    Ok(())
}
