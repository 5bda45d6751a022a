use photo_models::ModelPaths;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PAYMENT_URL: &str = "https://buy.stripe.com/9B6dR93I63dm45E3GzeQM00";
pub const DEFAULT_TIP_URL: &str = "https://ko-fi.com/primavera70043";

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Directory holding the ONNX model files
    pub model_dir: PathBuf,
    pub face_model_file: String,
    pub color_model_file: String,
    /// Directory for generated artifacts, served under `/outputs`
    pub output_dir: PathBuf,
    pub cache_ttl_secs: u64,
    /// Longest edge of the free preview
    pub preview_max_size: u32,
    pub watermark_opacity: f32,
    /// TrueType font for the watermark text, replacing the bundled one
    pub watermark_font: Option<PathBuf>,
    pub payment_url: String,
    pub tip_url: String,
    /// Address the service is reachable at, used in share links
    pub public_url: String,
    /// Instantiate models at startup instead of on the first request
    pub preload_models: bool,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
            model_dir: PathBuf::from("./models"),
            face_model_file: "gfpgan_v1.4.onnx".to_string(),
            color_model_file: "deoldify_artistic.onnx".to_string(),
            output_dir: PathBuf::from("./outputs"),
            cache_ttl_secs: 24 * 60 * 60, // 24 hours
            preview_max_size: 600,
            watermark_opacity: 0.3,
            watermark_font: None,
            payment_url: DEFAULT_PAYMENT_URL.to_string(),
            tip_url: DEFAULT_TIP_URL.to_string(),
            public_url: "http://localhost:7860".to_string(),
            preload_models: true,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup, falling back to
    /// defaults for missing or unparsable values
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            model_dir: lookup("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            face_model_file: lookup("FACE_MODEL_FILE").unwrap_or(defaults.face_model_file),
            color_model_file: lookup("COLOR_MODEL_FILE").unwrap_or(defaults.color_model_file),
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            cache_ttl_secs: parse_var(&lookup, "CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl_secs),
            preview_max_size: parse_var(&lookup, "PREVIEW_MAX_SIZE")
                .filter(|&size: &u32| size > 0)
                .unwrap_or(defaults.preview_max_size),
            watermark_opacity: parse_var(&lookup, "WATERMARK_OPACITY")
                .map(|o: f32| o.clamp(0.0, 1.0))
                .unwrap_or(defaults.watermark_opacity),
            watermark_font: lookup("WATERMARK_FONT")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            payment_url: lookup("PAYMENT_URL").unwrap_or(defaults.payment_url),
            tip_url: lookup("TIP_URL").unwrap_or(defaults.tip_url),
            public_url: lookup("PUBLIC_URL").unwrap_or(defaults.public_url),
            preload_models: lookup("PRELOAD_MODELS")
                .map(|v| parse_flag(&v).unwrap_or(defaults.preload_models))
                .unwrap_or(defaults.preload_models),
            max_upload_bytes: parse_var(&lookup, "MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            face_restorer: self.model_dir.join(&self.face_model_file),
            colorizer: self.model_dir.join(&self.color_model_file),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Parse a boolean the way HTML forms and env vars spell it
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
