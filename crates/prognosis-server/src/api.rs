//! HTTP API for predictions, health checks and Prometheus metrics

use crate::config::AllowedOrigins;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prognosis_core::{
    BatchResponse, HealthReport, PatientRecord, PredictError, PredictionResult, PredictionService,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Multipart field carrying the CSV upload
pub const UPLOAD_FIELD: &str = "file";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(service: PredictionService, max_upload_bytes: usize) -> Self {
        Self {
            service,
            max_upload_bytes,
        }
    }
}

/// Errors rendered as `{"detail": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unprocessable(String),
    /// Upload stream failures keep the status the extractor chose (413 on overflow)
    Upload(StatusCode, String),
    Internal(String),
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Upload(e.status(), e.body_text())
    }
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        if e.is_validation() {
            ApiError::Unprocessable(e.to_string())
        } else {
            ApiError::BadRequest(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            ApiError::Unprocessable(d) => (StatusCode::UNPROCESSABLE_ENTITY, d),
            ApiError::Upload(status, d) => (status, d),
            ApiError::Internal(d) => (StatusCode::INTERNAL_SERVER_ERROR, d),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Service status; always 200
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(HealthReport::from_state(state.service.state()))
}

async fn predict_single(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PatientRecord>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(record) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let result = state.service.predict_single(&record)?;
    Ok(Json(result))
}

async fn predict_batch(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::Unprocessable(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content = field.bytes().await?;
        upload = Some((filename, content));
        break;
    }

    let (filename, content) = upload
        .ok_or_else(|| ApiError::Unprocessable(format!("field '{}' is required", UPLOAD_FIELD)))?;

    // Inference is CPU-bound; keep it off the async workers
    let service = state.service.clone();
    let response = tokio::task::spawn_blocking(move || service.predict_batch(&content, &filename))
        .await
        .map_err(|e| ApiError::Internal(format!("batch task failed: {}", e)))??;
    Ok(Json(response))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return ApiError::Internal(e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Build the CORS layer. Credentials are allowed, so origins, methods and
/// headers are mirrored from the request rather than wildcarded.
pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::mirror_request(),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!(origin = %o, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/predict/single", post(predict_single))
        .route("/predict/batch", post(predict_batch))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    addr: &str,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
