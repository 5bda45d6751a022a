//! Model adapters for photo restoration
//!
//! Wraps two pretrained ONNX models behind small traits:
//!
//! - [`FaceRestorer`]: GFPGAN-style face restoration, operating on BGR frames
//! - [`Colorizer`]: DeOldify-style colorization, operating on RGB images
//!
//! Models are opaque. This crate only handles tensor layout, pixel
//! conventions at the model boundary, and lazy instantiation through
//! [`ModelRegistry`].

mod colorize;
mod error;
mod face;
mod frame;
mod onnx;
mod registry;
mod tensor;

pub use colorize::{Colorizer, OnnxColorizer, DEFAULT_RENDER_FACTOR};
pub use error::{ModelError, Result};
pub use face::{FaceRestorer, OnnxFaceRestorer, RestoreParams};
pub use frame::BgrFrame;
pub use registry::{LoadedModels, ModelPaths, ModelRegistry};
