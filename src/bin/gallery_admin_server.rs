//! gallery_admin_server - admin HTTP API for tag recalculation.
//!
//! Reads config from env vars (a `.env` file is honoured):
//!   NOTION_TOKEN, NOTION_WORKS_DATABASE_ID, NOTION_TAGS_DATABASE_ID (required)
//!   ADMIN_TOKEN      - bearer token for /api routes (required)
//!   ADMIN_BIND_ADDR  - listen address (default: 0.0.0.0:8787)

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use gallery_admin::api::{build_router, BearerAuth};
use gallery_admin::config::{AdminConfig, ServerConfig};
use gallery_admin::notion::NotionStores;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gallery_admin=debug,tower_http=info".into()),
        )
        .init();

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    let server = ServerConfig::from_env().context("reading server settings")?;
    let config = AdminConfig::from_env().context("reading Notion settings")?;
    let defaults = config.recalc;

    tracing::info!(
        max_updates = defaults.max_updates,
        pace_ms = defaults.pace.as_millis() as u64,
        "recalculation defaults"
    );

    let app = build_router(
        Arc::new(NotionStores::new(config)),
        defaults,
        BearerAuth::new(&server.admin_token),
    )
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&server.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", server.bind_addr))?;
    tracing::info!("gallery_admin_server listening on {}", server.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
