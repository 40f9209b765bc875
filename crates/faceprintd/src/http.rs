//! HTTP surface: `/health`, `/enroll`, `/verify`.
//!
//! Errors are returned as `{"detail": "..."}` with a 4xx status for anything
//! the client can fix and 5xx when the engine fails.

use crate::engine::{EngineError, EngineHandle};
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use faceprint_core::{Comparison, DecodeError, EMBEDDING_DIM};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

const ACCEPTED_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: EngineHandle,
    model_name: Arc<str>,
    match_threshold: f64,
}

impl AppState {
    pub fn new(engine: EngineHandle, model_name: &str, match_threshold: f64) -> Self {
        Self {
            engine,
            model_name: Arc::from(model_name),
            match_threshold,
        }
    }
}

/// Build the service router with CORS, request tracing and an upload size limit.
pub fn router(state: AppState, cors_origins: &[String], max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/enroll", post(enroll))
        .route("/verify", post(verify))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentials are always allowed, so origins must be listed explicitly;
/// a `*` entry is dropped rather than handed to the layer.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            if origin == "*" {
                tracing::warn!("ignoring wildcard CORS origin; list origins explicitly");
                return None;
            }
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Client-facing error: a status code and a human-readable detail message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: &self.detail })).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Decode(DecodeError::Empty) => Self::bad_request("Empty image file"),
            EngineError::Decode(DecodeError::Image(e)) => {
                tracing::debug!(error = %e, "enroll: image decode failed");
                Self::bad_request("Could not decode image")
            }
            EngineError::NoFaceDetected => Self::bad_request("No face detected"),
            EngineError::Analysis(_) | EngineError::MissingEmbedding => {
                tracing::error!(error = %err, "enroll: face analysis failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Face analysis failed")
            }
            EngineError::Spawn(_) | EngineError::ChannelClosed => {
                tracing::error!(error = %err, "enroll: engine unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Face engine unavailable")
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    model: String,
    dim: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        model: state.model_name.to_string(),
        dim: EMBEDDING_DIM,
    })
}

#[derive(Serialize)]
struct EnrollResponse {
    student_id: i64,
    embedding: Vec<f32>,
    dim: usize,
    model: String,
}

/// The file part of an enroll form.
struct Upload {
    content_type: Option<String>,
    data: Vec<u8>,
}

async fn enroll(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<EnrollResponse>, ApiError> {
    let mut student_id = None;
    let mut selfie = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("student_id") => student_id = Some(field.text().await?),
            Some("selfie") => {
                let content_type = field.content_type().map(str::to_owned);
                let data = field.bytes().await?.to_vec();
                selfie = Some(Upload { content_type, data });
            }
            _ => {}
        }
    }

    let student_id: i64 = student_id
        .ok_or_else(|| ApiError::unprocessable("Missing form field: student_id"))?
        .trim()
        .parse()
        .map_err(|_| ApiError::unprocessable("student_id must be an integer"))?;
    let selfie = selfie.ok_or_else(|| ApiError::unprocessable("Missing form field: selfie"))?;

    let content_type = selfie.content_type.as_deref().unwrap_or_default();
    if !ACCEPTED_IMAGE_TYPES.contains(&content_type) {
        tracing::debug!(student_id, content_type, "enroll: rejected content type");
        return Err(ApiError::bad_request("Unsupported image type (use JPG or PNG)"));
    }
    if selfie.data.is_empty() {
        return Err(ApiError::bad_request("Empty image file"));
    }

    tracing::info!(student_id, bytes = selfie.data.len(), "enroll requested");
    let result = state.engine.enroll(selfie.data).await?;
    tracing::info!(
        student_id,
        faces = result.faces_detected,
        area = result.face.area(),
        confidence = result.face.confidence,
        "enroll completed"
    );

    Ok(Json(EnrollResponse {
        student_id,
        dim: result.embedding.dim(),
        embedding: result.embedding.values,
        model: state.model_name.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    #[serde(rename = "embeddingA")]
    embedding_a: Vec<f32>,
    #[serde(rename = "embeddingB")]
    embedding_b: Vec<f32>,
    #[serde(default)]
    threshold: Option<f64>,
}

async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<Comparison>, ApiError> {
    let Json(req) = payload?;
    let threshold = req.threshold.unwrap_or(state.match_threshold);

    let comparison = faceprint_core::compare(&req.embedding_a, &req.embedding_b, threshold)
        .map_err(|e| {
            tracing::debug!(error = %e, "verify: rejected embeddings");
            ApiError::bad_request(format!("Embeddings must be length-{EMBEDDING_DIM} vectors"))
        })?;

    tracing::debug!(cosine = comparison.cosine, threshold, is_match = comparison.is_match, "verify");
    Ok(Json(comparison))
}
