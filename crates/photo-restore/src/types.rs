//! Wire types for the HTTP API

use serde::{Deserialize, Serialize};

/// Successful `/restore` response
#[derive(Debug, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub success: bool,
    /// Base64-encoded PNG of the full-resolution result
    pub restored_image: String,
    pub restored_url: String,
    pub message: String,
}

/// Error envelope for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
}
