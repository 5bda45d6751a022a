//! Error types for model loading and inference

use std::fmt;
use std::path::PathBuf;

/// Errors raised while loading or running a model
#[derive(Debug, Clone)]
pub enum ModelError {
    /// Model file not found at the expected path
    NotFound(PathBuf),
    /// ONNX session could not be created
    Load(String),
    /// Inference failed
    Inference(String),
    /// Input could not be converted to the model's tensor layout
    Preprocess(String),
    /// Model output could not be converted back to an image
    Postprocess(String),
    /// Requested capability is not provided by this model
    Unavailable(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "Model file not found: {}", path.display()),
            Self::Load(msg) => write!(f, "Model load failed: {}", msg),
            Self::Inference(msg) => write!(f, "Inference failed: {}", msg),
            Self::Preprocess(msg) => write!(f, "Preprocessing failed: {}", msg),
            Self::Postprocess(msg) => write!(f, "Postprocessing failed: {}", msg),
            Self::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
