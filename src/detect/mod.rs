//! Object detection capability.
//!
//! The classifier consumes detection through the `DetectorBackend` trait;
//! which implementation runs is a configuration concern. The default `blob`
//! backend needs no model file; the `tract` backend (feature
//! `backend-tract`) runs a local ONNX person detector.

pub mod backend;
pub mod blob;
#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::{anyhow, Result};

pub use backend::{BoundingBox, Detection, DetectorBackend, CLASS_PERSON};
pub use blob::BlobBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use crate::config::DetectorSettings;

/// Build the configured backend and warm it up.
pub fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match settings.backend.as_str() {
        "blob" => Box::new(BlobBackend::new()),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = settings
                .model_path
                .as_deref()
                .ok_or_else(|| anyhow!("detector backend 'tract' requires a model_path"))?;
            Box::new(
                TractBackend::new(model_path, settings.input_width, settings.input_height)?
                    .with_threshold(settings.confidence_threshold),
            )
        }
        other => {
            return Err(anyhow!(
                "unknown detector backend '{}' (available: blob{})",
                other,
                if cfg!(feature = "backend-tract") {
                    ", tract"
                } else {
                    ""
                }
            ))
        }
    };
    backend.warm_up()?;
    log::info!("detector backend ready: {}", backend.name());
    Ok(backend)
}
