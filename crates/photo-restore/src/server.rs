//! HTTP server for the restoration service
//!
//! Provides `POST /restore`, `GET /health`, the HTML form at `/` and the
//! generated artifacts under `/outputs`.

use crate::config::parse_flag;
use crate::error::{ApiError, Result};
use crate::fingerprint::{encode_png, ProcessOptions};
use crate::form;
use crate::pipeline::{Pipeline, Processed};
use crate::preview::PreviewConfig;
use crate::types::{HealthResponse, RestoreResponse};
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

/// Shared state for the HTTP server
pub struct ServerState {
    pub pipeline: Pipeline,
    pub preview: PreviewConfig,
    pub payment_url: String,
    pub tip_url: String,
    /// Public address of this service, used in share links
    pub public_url: String,
    pub max_upload_bytes: usize,
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let outputs = ServeDir::new(state.pipeline.output_dir());

    Router::new()
        .route("/", get(form::index).post(form::submit))
        .route("/restore", post(restore))
        .route("/health", get(health))
        .nest_service("/outputs", outputs)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, host: &str, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", host, port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        models_loaded: state.pipeline.models().is_loaded(),
    })
}

/// Restore an uploaded photo and return the full-resolution result inline
async fn restore(
    State(state): State<SharedState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<RestoreResponse>, ApiError> {
    let upload = read_upload(multipart?).await?;
    let bytes = upload.file.ok_or_else(|| ApiError::new("No file uploaded"))?;

    let processed = decode_and_process(&state, bytes, upload.options).await?;
    let restored_url = format!("/outputs/{}", processed.file_name());
    info!(
        fingerprint = %processed.fingerprint,
        from_cache = processed.from_cache,
        url = %restored_url,
        "Restore request complete"
    );

    let png = tokio::task::spawn_blocking(move || encode_png(&processed.image))
        .await
        .map_err(|e| ApiError::new(e.to_string()))??;

    Ok(Json(RestoreResponse {
        success: true,
        restored_image: STANDARD.encode(png),
        restored_url,
        message: "Image restored successfully".to_string(),
    }))
}

/// Parsed multipart upload shared by the API and the form
pub(crate) struct Upload {
    pub file: Option<Vec<u8>>,
    pub options: ProcessOptions,
}

/// Read the `file`, `restore_face` and `colorize` fields
///
/// Missing flags default to true. When a flag appears more than once the last
/// value wins, so a form can send a hidden `false` ahead of its checkbox.
pub(crate) async fn read_upload(mut multipart: Multipart) -> std::result::Result<Upload, ApiError> {
    let mut upload = Upload {
        file: None,
        options: ProcessOptions::default(),
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    upload.file = Some(bytes.to_vec());
                }
            }
            Some(flag @ ("restore_face" | "colorize")) => {
                let text = field.text().await?;
                let value = parse_flag(&text)
                    .ok_or_else(|| ApiError::new(format!("Invalid value for {}: {}", flag, text)))?;
                if flag == "restore_face" {
                    upload.options.restore_face = value;
                } else {
                    upload.options.colorize = value;
                }
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// Decode uploaded bytes and run the pipeline
pub(crate) async fn decode_and_process(
    state: &ServerState,
    bytes: Vec<u8>,
    options: ProcessOptions,
) -> Result<Processed> {
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
    state.pipeline.process(image, options).await
}
