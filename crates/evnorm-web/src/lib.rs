//! JSON API over the conversion engine, its diagnostics and the metrics aggregator.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use evnorm_convert::{ConversionEngine, ConversionError, ConversionResult, DiagnosticsRecorder};
use evnorm_core::{QualityMetrics, RawRecord};
use evnorm_metrics::MetricsAggregator;
use evnorm_pipeline::PipelineConfig;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "evnorm-web";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversionEngine>,
    pub metrics: Arc<MetricsAggregator>,
}

impl AppState {
    pub fn new(engine: Arc<ConversionEngine>, metrics: Arc<MetricsAggregator>) -> Self {
        Self { engine, metrics }
    }

    pub fn recorder(&self) -> &Arc<DiagnosticsRecorder> {
        self.engine.recorder()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            Arc::new(ConversionEngine::with_defaults()),
            Arc::new(MetricsAggregator::default()),
        )
    }
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    event_count: usize,
    results: Vec<ConversionResult>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/convert", post(convert_handler))
        .route("/convert/batch", post(convert_batch_handler))
        .route("/diagnostics/conversion", get(conversion_diagnostics_handler))
        .route("/diagnostics/extraction", get(extraction_diagnostics_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/dashboard", get(dashboard_handler))
        .route("/metrics/alerts", get(alerts_handler))
        .route("/metrics/reset", post(reset_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("EVNORM_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let config = PipelineConfig::from_env();
    let engine = config.build_engine(Arc::new(DiagnosticsRecorder::new()))?;
    let state = AppState::new(Arc::new(engine), Arc::new(config.build_metrics()?));
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving evnorm api");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<JsonValue> {
    Json(json!({ "status": "ok", "service": CRATE_NAME }))
}

async fn convert_handler(State(state): State<Arc<AppState>>, Json(payload): Json<JsonValue>) -> Response {
    match state.engine.convert_to_activity(&RawRecord::new(payload)) {
        Ok(result) => {
            state.metrics.record_conversion_attempt(true, &result.quality);
            Json(result).into_response()
        }
        Err(err) => conversion_failed(&state, err),
    }
}

async fn convert_batch_handler(State(state): State<Arc<AppState>>, Json(payload): Json<JsonValue>) -> Response {
    match state.engine.convert_all(&RawRecord::new(payload)) {
        Ok(results) => {
            for result in &results {
                state.metrics.record_conversion_attempt(true, &result.quality);
            }
            Json(BatchResponse {
                event_count: results.len(),
                results,
            })
            .into_response()
        }
        Err(err) => conversion_failed(&state, err),
    }
}

fn conversion_failed(state: &AppState, err: ConversionError) -> Response {
    warn!(error = %err, "conversion rejected");
    state.metrics.record_conversion_attempt(false, &QualityMetrics::default());
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

async fn conversion_diagnostics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.recorder().last_conversion() {
        Some(diagnostics) => Json(diagnostics).into_response(),
        None => not_found("no conversion recorded yet"),
    }
}

async fn extraction_diagnostics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.recorder().last_extraction() {
        Some(diagnostics) => Json(diagnostics).into_response(),
        None => not_found("no extraction recorded yet"),
    }
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.metrics.snapshot()).into_response()
}

async fn dashboard_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.metrics.dashboard_snapshot()).into_response()
}

async fn alerts_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.metrics.check_alerts()).into_response()
}

async fn reset_handler(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.reset();
    state.recorder().clear();
    info!("metrics window reset");
    StatusCode::NO_CONTENT.into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}
