//! Model trait and the versioned model handle held by the registry

use image::RgbImage;
use snaplabel_core::{Classification, Result};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Executable image classifier
///
/// Inference is CPU-bound and synchronous. Callers are expected to run
/// `predict` off any latency-sensitive thread; the classification service
/// does so on the blocking pool.
pub trait ImageModel: Send + Sync {
    /// Geometry the model expects its input image to have
    fn input_geometry(&self) -> InputGeometry;

    /// Score an upright image of exactly `input_geometry()` size
    ///
    /// Returns one raw (label, score) pair per class, in model order.
    fn predict(&self, image: &RgbImage) -> Result<Vec<Classification>>;
}

/// Input image size declared by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputGeometry {
    pub width: u32,
    pub height: u32,
}

impl InputGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one input image
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for InputGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A loaded, versioned classification model
///
/// Immutable once built. The registry hands it out as `Arc<Model>`, so a
/// retired model lives until the last in-flight request using it finishes.
#[derive(Clone)]
pub struct Model {
    name: String,
    version: String,
    loaded_at: SystemTime,
    inner: Arc<dyn ImageModel>,
}

impl Model {
    /// Wrap an executable model with its identity
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        inner: Arc<dyn ImageModel>,
    ) -> Result<Self> {
        let geometry = inner.input_geometry();
        if geometry.width == 0 || geometry.height == 0 {
            return Err(snaplabel_core::Error::model_load(format!(
                "model declares an empty input geometry ({})",
                geometry
            )));
        }

        Ok(Self {
            name: name.into(),
            version: version.into(),
            loaded_at: SystemTime::now(),
            inner,
        })
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider-defined version tag
    pub fn version(&self) -> &str {
        &self.version
    }

    /// When this model was built
    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    /// Input geometry of the underlying model
    pub fn input_geometry(&self) -> InputGeometry {
        self.inner.input_geometry()
    }

    /// Run inference on a prepared image
    pub fn predict(&self, image: &RgbImage) -> Result<Vec<Classification>> {
        self.inner.predict(image)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("input_geometry", &self.input_geometry())
            .finish()
    }
}
