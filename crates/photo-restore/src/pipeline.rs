//! Restoration pipeline: fingerprint, cache, models, artifact
//!
//! Each request first purges expired cache entries, then fingerprints the
//! input. A live cache entry whose artifact is still on disk short-circuits
//! the models entirely. On a miss both models are loaded (once per process),
//! the enabled steps run on the blocking pool, and the result is written as
//! a PNG artifact named after the cache key.

use crate::error::Result;
use crate::fingerprint::{cache_key, fingerprint, Fingerprint, ProcessOptions};
use image::{DynamicImage, ImageFormat, RgbImage};
use photo_models::{BgrFrame, LoadedModels, ModelRegistry, RestoreParams, DEFAULT_RENDER_FACTOR};
use result_cache::ResultCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Outcome of a processing request
#[derive(Debug, Clone)]
pub struct Processed {
    pub image: DynamicImage,
    /// Full-resolution PNG artifact on disk
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
    pub from_cache: bool,
}

impl Processed {
    /// File name of the artifact, as exposed under `/outputs`
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct Pipeline {
    cache: ResultCache,
    models: Arc<ModelRegistry>,
    output_dir: PathBuf,
    restore_params: RestoreParams,
    render_factor: u32,
}

impl Pipeline {
    pub fn new(cache: ResultCache, models: Arc<ModelRegistry>, output_dir: PathBuf) -> Self {
        Self {
            cache,
            models,
            output_dir,
            restore_params: RestoreParams::default(),
            render_factor: DEFAULT_RENDER_FACTOR,
        }
    }

    /// Ensure the output directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).await?;
        info!(output_dir = ?self.output_dir, "Output directory ready");
        Ok(())
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the artifact for `key` is written
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        self.output_dir.join(format!("result_{}.png", key))
    }

    /// Restore and/or colorize an image
    ///
    /// Model and disk errors propagate unchanged to the caller.
    #[instrument(skip(self, image), fields(restore_face = options.restore_face, colorize = options.colorize))]
    pub async fn process(&self, image: DynamicImage, options: ProcessOptions) -> Result<Processed> {
        let evicted = self.cache.evict_expired().await;
        let stats = self.cache.stats().await;
        debug!(
            evicted,
            entries = stats.entries,
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            "Cache stats"
        );

        let (image, fingerprint) = tokio::task::spawn_blocking(move || {
            let fp = fingerprint(&image)?;
            Ok::<_, crate::error::RestoreError>((image, fp))
        })
        .await??;

        let key = cache_key(&fingerprint, options);

        if let Some(cached) = self.load_cached(&key).await {
            info!(fingerprint = %fingerprint, path = ?cached.1, "Serving cached result");
            return Ok(Processed {
                image: cached.0,
                path: cached.1,
                fingerprint,
                from_cache: true,
            });
        }

        let models = self.models.load().await?;
        let path = self.artifact_path(&key);
        let params = self.restore_params;
        let render_factor = self.render_factor;

        let (result, path) = tokio::task::spawn_blocking(move || {
            let result = run_models(&models, &image, options, &params, render_factor)?;
            result.save_with_format(&path, ImageFormat::Png)?;
            Ok::<_, crate::error::RestoreError>((result, path))
        })
        .await??;

        self.cache.put(&key, &path).await;
        info!(
            fingerprint = %fingerprint,
            width = result.width(),
            height = result.height(),
            path = ?path,
            "Processed image"
        );

        Ok(Processed {
            image: DynamicImage::ImageRgb8(result),
            path,
            fingerprint,
            from_cache: false,
        })
    }

    /// Cached artifact for `key`, if the entry is live and the file readable
    async fn load_cached(&self, key: &str) -> Option<(DynamicImage, PathBuf)> {
        let path = self.cache.get(key).await?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            warn!(key = %key, path = ?path, "Cached artifact missing on disk");
            return None;
        }

        let loaded = tokio::task::spawn_blocking(move || image::open(&path).map(|img| (img, path))).await;
        match loaded {
            Ok(Ok(hit)) => Some(hit),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Failed to read cached artifact");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached artifact read task failed");
                None
            }
        }
    }
}

/// Run the enabled model steps
///
/// The working buffer is kept in BGR between steps; the face restorer
/// consumes it directly and the colorizer sees an RGB copy.
pub fn run_models(
    models: &LoadedModels,
    image: &DynamicImage,
    options: ProcessOptions,
    params: &RestoreParams,
    render_factor: u32,
) -> Result<RgbImage> {
    let mut frame = BgrFrame::from_rgb(&image.to_rgb8());

    if options.restore_face {
        debug!("Restoring faces");
        frame = models.face_restorer.enhance(&frame, params)?;
    }

    if options.colorize {
        debug!(render_factor, "Colorizing image");
        let colorized = models.colorizer.colorize(&frame.to_rgb(), render_factor)?;
        frame = BgrFrame::from_rgb(&colorized);
    }

    Ok(frame.to_rgb())
}
