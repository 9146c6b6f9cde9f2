// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MINT CRM Server
//!
//! Serves the REST API and runs the periodic jobs:
//! - Overdue case escalation
//! - Queued email delivery and old email cleanup
//! - Meeting reminders
//! - Automated report generation

use tracing::{info, warn};

use mint_crm_core::migrations;
use mint_crm_server::workers::BackgroundWorkers;
use mint_crm_server::{AppState, Config, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mint_crm_server=info,mint_crm_core=info".into()),
        )
        .init();

    if let Err(e) = dotenv {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        media_dir = %config.media_dir.display(),
        smtp = config.smtp.is_some(),
        sms = config.sms_base_url.is_some(),
        "Starting MINT CRM server"
    );

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    migrations::run(&pool).await?;
    info!("Database migrations applied");

    tokio::fs::create_dir_all(&config.media_dir).await?;

    let addr = config.http_addr;
    let state = AppState::new(pool, config)?;
    let workers = BackgroundWorkers::start(&state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server ready");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    workers.shutdown().await;
    info!("MINT CRM server shut down");

    Ok(())
}
