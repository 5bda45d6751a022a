//! Lazily instantiated, process-lifetime model handles

use crate::colorize::{Colorizer, OnnxColorizer};
use crate::error::{ModelError, Result};
use crate::face::{FaceRestorer, OnnxFaceRestorer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

type Loader<T> = Arc<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// Locations of the ONNX model files
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub face_restorer: PathBuf,
    pub colorizer: PathBuf,
}

/// Both models, ready for inference
#[derive(Clone)]
pub struct LoadedModels {
    pub face_restorer: Arc<dyn FaceRestorer>,
    pub colorizer: Arc<dyn Colorizer>,
}

/// Holds the model handles for the lifetime of the process
///
/// Each model is created on first use by its loader and never reloaded.
/// Loading runs on the blocking thread pool. If a loader fails the cell stays
/// empty and the next call tries again.
pub struct ModelRegistry {
    face_restorer: OnceCell<Arc<dyn FaceRestorer>>,
    colorizer: OnceCell<Arc<dyn Colorizer>>,
    load_face_restorer: Loader<dyn FaceRestorer>,
    load_colorizer: Loader<dyn Colorizer>,
}

impl ModelRegistry {
    /// Registry backed by ONNX model files
    pub fn onnx(paths: ModelPaths) -> Self {
        let ModelPaths {
            face_restorer,
            colorizer,
        } = paths;

        Self::with_loaders(
            move || {
                let model: Arc<dyn FaceRestorer> = Arc::new(OnnxFaceRestorer::load(&face_restorer)?);
                Ok(model)
            },
            move || {
                let model: Arc<dyn Colorizer> = Arc::new(OnnxColorizer::load(&colorizer)?);
                Ok(model)
            },
        )
    }

    /// Registry with custom loaders
    pub fn with_loaders<F, C>(load_face_restorer: F, load_colorizer: C) -> Self
    where
        F: Fn() -> Result<Arc<dyn FaceRestorer>> + Send + Sync + 'static,
        C: Fn() -> Result<Arc<dyn Colorizer>> + Send + Sync + 'static,
    {
        Self {
            face_restorer: OnceCell::new(),
            colorizer: OnceCell::new(),
            load_face_restorer: Arc::new(load_face_restorer),
            load_colorizer: Arc::new(load_colorizer),
        }
    }

    /// Return both models, instantiating any that are not loaded yet
    pub async fn load(&self) -> Result<LoadedModels> {
        let face_restorer = self
            .face_restorer
            .get_or_try_init(|| load_blocking(self.load_face_restorer.clone(), "face restorer"))
            .await?
            .clone();

        let colorizer = self
            .colorizer
            .get_or_try_init(|| load_blocking(self.load_colorizer.clone(), "colorizer"))
            .await?
            .clone();

        Ok(LoadedModels {
            face_restorer,
            colorizer,
        })
    }

    /// True once both models have been instantiated
    pub fn is_loaded(&self) -> bool {
        self.face_restorer.initialized() && self.colorizer.initialized()
    }
}

async fn load_blocking<T>(loader: Loader<T>, name: &'static str) -> Result<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    info!(model = name, "Loading model");
    let model = tokio::task::spawn_blocking(move || loader())
        .await
        .map_err(|e| ModelError::Load(format!("{} loader panicked: {}", name, e)))??;
    info!(model = name, "Model loaded");
    Ok(model)
}
