//! vdx-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, connects the store
//! and portal client, wires middleware, starts the collection scheduler,
//! and serves HTTP. All route handlers live in `routes.rs`; all shared
//! state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use vdx_collector::{CycleOptions, EnvCredentials};
use vdx_config::CollectorSettings;
use vdx_daemon::{routes, state};
use vdx_db::PgStateStore;
use vdx_portal::CantaloupeClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = load_settings()?;

    let pool = vdx_db::connect_from_env().await?;
    vdx_db::migrate(&pool).await?;

    let portal = CantaloupeClient::new(&settings.portal_base_url)
        .map_err(|e| anyhow::anyhow!("portal client init failed: {e}"))?;

    let collector = Arc::new(state::CollectorHandle {
        store: Arc::new(PgStateStore::new(pool)),
        portal: Arc::new(portal),
        credentials: Arc::new(EnvCredentials),
        options: CycleOptions {
            inter_company_delay: Duration::from_secs(settings.inter_company_delay_secs),
        },
    });
    let shared = Arc::new(state::AppState::new(collector));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_scheduler(
        Arc::clone(&shared),
        Duration::from_secs(settings.schedule_minutes * 60),
    );

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8790)));
    info!("vdx-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
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

/// Collector settings from the layered YAML named by `VDX_CONFIG`
/// (comma-separated paths, later files override), or defaults if unset.
fn load_settings() -> anyhow::Result<CollectorSettings> {
    match std::env::var("VDX_CONFIG") {
        Ok(paths) => {
            let paths: Vec<&str> = paths.split(',').map(str::trim).collect();
            let loaded = vdx_config::load_layered_yaml(&paths)?;
            info!(config_hash = %loaded.config_hash, "config loaded");
            CollectorSettings::from_config(&loaded.config_json)
        }
        Err(_) => Ok(CollectorSettings::default()),
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("VDX_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
