use crate::heuristics::MODEL_NAME;
use crate::server::error::ApiError;
use crate::server::requests::{AnalyzeRequest, ReportRequest};
use crate::server::responses::{AnalyzeResponse, HealthResponse, ReportResponse, StatsResponse};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use std::sync::atomic::Ordering;
use uuid::Uuid;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = payload?;
    let email = request.into_record()?;

    let outcome = state.engine.evaluate(&email);
    log::info!(
        "Analyzed mail from {}: score {} (suspicious: {})",
        email.from,
        outcome.score,
        outcome.suspicious
    );

    Ok(Json(AnalyzeResponse {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        outcome,
    }))
}

pub async fn report(
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let Json(request) = payload?;
    request.validate()?;

    let id = Uuid::new_v4();
    let total = state.reports_received.fetch_add(1, Ordering::Relaxed) + 1;
    log::info!(
        "Report {} received from {:?} subject {:?} reason {:?} ({} total)",
        id,
        request.from.as_deref().unwrap_or_default(),
        request.subject.as_deref().unwrap_or_default(),
        request.reason.as_deref().unwrap_or("unspecified"),
        total
    );

    Ok(Json(ReportResponse {
        id,
        status: "received",
        message: "Thank you for reporting. This helps improve phishing detection.",
    }))
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        reports_received: state.reports_received.load(Ordering::Relaxed),
        accuracy_score: 0,
        models_available: vec![MODEL_NAME],
    })
}
