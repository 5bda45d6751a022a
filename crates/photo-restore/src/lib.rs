//! Old photo restoration and colorization service
//!
//! Uploaded photos run through optional face restoration and colorization.
//! The full-resolution result is kept on disk for paid download while the
//! browser form shows a downscaled, watermarked preview.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod form;
pub mod pipeline;
pub mod preview;
pub mod server;
pub mod types;

pub use config::Config;
pub use error::{ApiError, RestoreError, Result};
pub use fingerprint::{Fingerprint, ProcessOptions};
pub use pipeline::{Pipeline, Processed};
pub use preview::{PreviewConfig, WatermarkStyle};
pub use server::{create_router, start_server, ServerState, SharedState};
