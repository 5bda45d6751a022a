//! Shared ONNX Runtime session plumbing

use crate::error::{ModelError, Result};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Build an optimized session from a model file on disk
pub(crate) fn load_session(path: &Path) -> Result<Session> {
    if !path.exists() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }

    let session = Session::builder()
        .map_err(|e| ModelError::Load(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ModelError::Load(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e| ModelError::Load(e.to_string()))?;

    debug!(path = %path.display(), "ONNX session created");
    Ok(session)
}

/// Run a single-input, single-output model
///
/// Returns the output shape and its flattened data.
pub(crate) fn run_single(
    session: &Mutex<Session>,
    input: &Array4<f32>,
) -> Result<(Vec<i64>, Vec<f32>)> {
    let mut session = session
        .lock()
        .map_err(|_| ModelError::Inference("Session lock poisoned".to_string()))?;

    let input = input.as_standard_layout().into_owned();
    let input_ref = ort::value::TensorRef::from_array_view(&input)
        .map_err(|e| ModelError::Preprocess(e.to_string()))?;

    let outputs = session
        .run(ort::inputs![input_ref])
        .map_err(|e| ModelError::Inference(e.to_string()))?;

    let (_, output) = outputs
        .iter()
        .next()
        .ok_or_else(|| ModelError::Postprocess("No output tensor".to_string()))?;

    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| ModelError::Postprocess(e.to_string()))?;

    Ok((shape.to_vec(), data.to_vec()))
}
