use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::analytics::{self, PipelineSettings, TransactionSource};
use crate::error::PipelineError;
use crate::models::HourlyGasResponse;

const API_VERSION: &str = "v1";

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn TransactionSource + Send + Sync>,
    pub settings: PipelineSettings,
    pub request_timeout: Duration,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HttpError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    Timeout,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Pipeline(err @ PipelineError::InvalidDateFormat(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            ApiError::Pipeline(err @ PipelineError::EmptyResult(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
            ApiError::Pipeline(PipelineError::SourceUnavailable(cause)) => {
                tracing::error!("hourly gas query failed: {}", cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "could not compute hourly gas".to_string(),
                )
            }
            ApiError::Timeout => {
                tracing::warn!("hourly gas query exceeded its deadline");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "hourly gas query timed out".to_string(),
                )
            }
        };
        let body = HttpError {
            code: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Hourly average fee paid by EOA to EOA transfers on `day` (`YYYY-Mon-DD`).
async fn gas_hourly(
    State(state): State<AppState>,
    Path(day): Path<String>,
) -> Result<Json<HourlyGasResponse>, ApiError> {
    let run = analytics::hourly_fees(state.source.as_ref(), &day, &state.settings);
    let response = tokio::time::timeout(state.request_timeout, run)
        .await
        .map_err(|_| ApiError::Timeout)??;
    Ok(Json(response))
}

pub fn app_router(state: AppState) -> Router {
    let public = Router::new().route("/gashourly/:day", get(gas_hourly));

    Router::new()
        .route("/health", get(health))
        .nest(&format!("/api/{}", API_VERSION), public)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

pub async fn run_http_server(addr: &str, state: AppState) -> Result<()> {
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, draining connections");
}
