//! QF Settlement Ledger service: entry point.
//!
//! Rebuilds the ledger by replaying the persisted event log, then serves the
//! ledger over an Axum REST API. Background tasks carry decryption jobs to the
//! oracle, commit its callbacks and expire stale reveal requests.

mod api;
mod attest;
mod callback;
mod config;
mod db;
mod engine;
mod errors;
mod events;
mod oracle;
mod state;
mod sweeper;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use qf_settlement::{Ledger, SubmitterPolicy};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, OracleMode};
use engine::ServiceEngine;
use oracle::ChannelOracle;
use state::{AppState, LedgerHandle};

const CALLBACK_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // ─── Ledger replay ────────────────────────────────────
    let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
    let (callbacks_tx, callbacks_rx) = mpsc::channel(CALLBACK_QUEUE);

    let log = db::load_all_events(&pool).await?;
    let engine = ServiceEngine::for_mode(&config.oracle_mode);
    info!(engine = engine.name(), "FHE engine selected");
    let ledger = Ledger::replay(
        engine,
        ChannelOracle::new(jobs_tx, config.oracle_key.clone()),
        SubmitterPolicy,
        &log,
    )?;
    info!(events = log.len(), projects = ledger.project_count()?, "Ledger restored");

    let state = Arc::new(AppState::new(
        LedgerHandle::new(ledger, log.len()),
        pool,
        callbacks_tx.clone(),
        config.clone(),
    ));
    let cancel = CancellationToken::new();

    // ─── Background tasks ─────────────────────────────────
    let mut tasks = Vec::new();
    match &config.oracle_mode {
        OracleMode::Local => {
            warn!("ORACLE_MODE=local: ciphertexts are transparent, do not use in production");
            tasks.push(tokio::spawn(oracle::run_local(
                jobs_rx,
                config.oracle_key.clone(),
                callbacks_tx,
                cancel.clone(),
            )));
        }
        OracleMode::Gateway { url } => {
            // Gateway mode only hears back over HTTP.
            drop(callbacks_tx);
            let client = oracle::gateway_client()?;
            tasks.push(tokio::spawn(oracle::run_gateway(
                jobs_rx,
                client,
                url.clone(),
                config.callback_url.clone(),
                cancel.clone(),
            )));
        }
    }
    tasks.push(tokio::spawn(callback::run(
        state.clone(),
        callbacks_rx,
        cancel.clone(),
    )));
    tasks.push(tokio::spawn(sweeper::run(state.clone(), cancel.clone())));

    // ─── REST API ─────────────────────────────────────────
    let app = Router::new()
        .route("/health", get(api::health))
        .route("/projects", post(api::submit_project))
        .route("/projects/:id", get(api::get_project))
        .route(
            "/projects/:id/contributions",
            post(api::contribute).get(api::get_contributions),
        )
        .route("/projects/:id/close", post(api::close_project))
        .route("/projects/:id/reveal", post(api::request_reveal))
        .route("/projects/:id/revealed", get(api::get_revealed))
        .route("/projects/:id/matching", get(api::get_matching))
        .route("/projects/:id/events", get(api::get_project_events))
        .route("/events", get(api::get_all_events))
        .route("/oracle/callback", post(api::oracle_callback))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    info!("Shutdown complete");
    Ok(())
}
