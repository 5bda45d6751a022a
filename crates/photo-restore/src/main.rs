//! Photo restoration service entry point

use photo_models::ModelRegistry;
use photo_restore::{
    start_server, Config, Pipeline, PreviewConfig, RestoreError, Result, ServerState, SharedState,
    WatermarkStyle,
};
use result_cache::ResultCache;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("photo_restore=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting photo restoration service...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("Model dir: {:?}", config.model_dir);
    info!("Output dir: {:?}", config.output_dir);
    info!("Cache TTL: {} seconds", config.cache_ttl_secs);

    let registry = Arc::new(ModelRegistry::onnx(config.model_paths()));
    let pipeline = Pipeline::new(
        ResultCache::new(config.cache_ttl()),
        registry.clone(),
        config.output_dir.clone(),
    );
    pipeline.init().await?;

    if config.preload_models {
        match registry.load().await {
            Ok(_) => info!("Models loaded"),
            Err(e) => warn!(error = %e, "Model preload failed; will retry on first request"),
        }
    }

    let mut watermark = WatermarkStyle {
        opacity: config.watermark_opacity,
        ..WatermarkStyle::default()
    };
    if let Some(font) = &config.watermark_font {
        watermark = watermark.with_font_file(font);
    }

    let state: SharedState = Arc::new(ServerState {
        pipeline,
        preview: PreviewConfig {
            max_size: config.preview_max_size,
            watermark,
        },
        payment_url: config.payment_url.clone(),
        tip_url: config.tip_url.clone(),
        public_url: config.public_url.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    // Start HTTP server (blocking)
    start_server(state, &config.host, config.port)
        .await
        .map_err(|e| RestoreError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
