//! HTTP API exposing the heuristic engine plus report intake.

pub mod error;
pub mod handlers;
pub mod requests;
pub mod responses;

use crate::heuristics::{self, HeuristicEngine};
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: &'static HeuristicEngine,
    pub reports_received: Arc<AtomicU64>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            engine: heuristics::engine(),
            reports_received: Arc::new(AtomicU64::new(0)),
        }
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    log::info!("{} {}", request.method(), request.uri().path());
    next.run(request).await
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/report", post(handlers::report))
        .route("/api/stats", get(handlers::stats))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    log::info!("Received shutdown signal, stopping API server");
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("MailGuard API server listening on {}", listener.local_addr()?);
    log::info!("POST /api/analyze - Analyze email");
    log::info!("POST /api/report - Report phishing email");
    log::info!("GET /api/stats - Get statistics");
    log::info!("GET /health - Health check");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
