//! usy-daemon entry point.
//!
//! Thin: loads config, builds the ledger, runs the startup reconciliation,
//! starts the timers and serves HTTP. Handlers live in `routes.rs`.
//!
//! Usage: `usy-daemon [config.yaml ...]` (later files override earlier ones).

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::Method;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};
use usy_config::{load_layered_yaml, resolve_secrets, UsyConfig};
use usy_daemon::{routes, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("config load failed")?;
    let cfg = loaded.typed()?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let secrets = resolve_secrets(&cfg);
    if secrets.admin_ids.is_empty() {
        warn!("no admin ids configured; admin commands are open to everyone");
    }

    let ledger = Arc::new(usy_ledger::build_ledger(&cfg, &secrets)?);
    let shared = Arc::new(state::AppState::new(
        ledger,
        state::AdminPolicy::new(secrets.admin_ids.clone()),
    ));

    // Ready only after one pass; the seed guarantees it ends with a map.
    let startup = shared.reconcile().await;
    info!(tier = %startup.tier, players = startup.map.len(), "startup reconciliation complete");

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_refresh(
        Arc::clone(&shared),
        Duration::from_secs(cfg.ledger.refresh_interval_secs.max(1)),
    );

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_public_read_only());

    let addr = bind_addr(&cfg)?;
    info!("usy-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `USY_DAEMON_ADDR` wins, then `PORT` (all interfaces), then the config.
fn bind_addr(cfg: &UsyConfig) -> anyhow::Result<SocketAddr> {
    if let Some(addr) = std::env::var("USY_DAEMON_ADDR")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        return Ok(addr);
    }
    if let Some(port) = std::env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()) {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    cfg.daemon
        .addr
        .parse()
        .with_context(|| format!("invalid daemon.addr: {}", cfg.daemon.addr))
}

/// The leaderboard page is served from elsewhere and only reads.
fn cors_public_read_only() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
