//! Error types for the photo restoration service

use crate::types::ErrorResponse;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use photo_models::ModelError;
use std::fmt;

#[derive(Debug)]
pub enum RestoreError {
    /// Image could not be decoded or encoded
    Image(image::ImageError),
    /// A model failed to load or run
    Model(ModelError),
    Io(Box<std::io::Error>),
    /// A blocking task panicked or was cancelled
    Task(String),
    Config(String),
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreError::Image(err) => write!(f, "Image error: {}", err),
            RestoreError::Model(err) => write!(f, "Model error: {}", err),
            RestoreError::Io(err) => write!(f, "IO error: {}", err),
            RestoreError::Task(msg) => write!(f, "Task error: {}", msg),
            RestoreError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for RestoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RestoreError::Image(err) => Some(err),
            RestoreError::Model(err) => Some(err),
            RestoreError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<image::ImageError> for RestoreError {
    fn from(err: image::ImageError) -> Self {
        RestoreError::Image(err)
    }
}

impl From<ModelError> for RestoreError {
    fn from(err: ModelError) -> Self {
        RestoreError::Model(err)
    }
}

impl From<std::io::Error> for RestoreError {
    fn from(err: std::io::Error) -> Self {
        RestoreError::Io(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for RestoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        RestoreError::Task(err.to_string())
    }
}

impl From<tracing_subscriber::filter::ParseError> for RestoreError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        RestoreError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;

/// Failure at the HTTP boundary
///
/// Every failure maps to a 500 carrying the error's string form; corrupt
/// uploads and model crashes are not distinguished.
#[derive(Debug)]
pub struct ApiError(String);

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RestoreError> for ApiError {
    fn from(err: RestoreError) -> Self {
        Self(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self(err.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        Self(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { detail: self.0 }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_display() {
        let err = RestoreError::Model(ModelError::Inference("out of memory".to_string()));
        assert_eq!(
            format!("{}", err),
            "Model error: Inference failed: out of memory"
        );
    }

    #[test]
    fn test_io_error_source() {
        let err: RestoreError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into();
        assert!(err.to_string().contains("read-only"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_error_display() {
        let err = RestoreError::Config("bad PORT".to_string());
        assert_eq!(format!("{}", err), "Configuration error: bad PORT");
    }

    #[test]
    fn test_api_error_from_restore_error_keeps_message() {
        let err: ApiError = RestoreError::Config("bad".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: bad");
    }

    #[tokio::test]
    async fn test_api_error_response_is_500_with_detail() {
        let response = ApiError::new("model exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "model exploded");
    }

    #[test]
    fn test_decode_error_is_non_empty() {
        let err: RestoreError = image::load_from_memory(b"not an image").unwrap_err().into();
        assert!(err.to_string().starts_with("Image error: "));
        assert!(err.to_string().len() > "Image error: ".len());
    }
}
