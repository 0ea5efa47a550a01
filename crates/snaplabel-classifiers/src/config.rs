//! Configuration for the classification service and model manifests

use crate::model::InputGeometry;
use crate::preprocess::CropScale;
use serde::{Deserialize, Serialize};
use snaplabel_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Classification service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Number of highest-confidence classifications to keep
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How images are fitted to the model's input geometry
    #[serde(default)]
    pub crop_scale: CropScale,

    /// Largest decoded image accepted, in pixels
    #[serde(default = "default_max_image_pixels")]
    pub max_image_pixels: u64,
}

impl ServiceConfig {
    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::config("top_k must be at least 1"));
        }
        if self.max_image_pixels == 0 {
            return Err(Error::config("max_image_pixels must be at least 1"));
        }
        Ok(())
    }

    /// Set top-K
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set crop/scale policy
    pub fn with_crop_scale(mut self, crop_scale: CropScale) -> Self {
        self.crop_scale = crop_scale;
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            crop_scale: CropScale::default(),
            max_image_pixels: default_max_image_pixels(),
        }
    }
}

fn default_top_k() -> usize {
    2
}

fn default_max_image_pixels() -> u64 {
    64_000_000
}

/// Description of a loadable model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Model name
    pub name: String,

    /// Provider-defined version tag
    pub version: String,

    /// Where the weights live
    pub source: ModelSource,

    /// Class labels, in output order
    #[serde(default)]
    pub labels: Vec<String>,

    /// File with one label per line, used when `labels` is empty
    pub labels_path: Option<PathBuf>,

    /// Input geometry the weights were trained for
    pub input: InputSpec,

    /// Per-channel normalization applied after scaling pixels to [0, 1]
    #[serde(default)]
    pub normalization: Normalization,
}

impl ModelManifest {
    /// Load from a YAML file
    ///
    /// Relative paths inside the manifest are resolved against the
    /// manifest's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut manifest: Self = serde_yaml::from_str(&content)?;

        if let Some(base) = path.parent() {
            manifest.resolve_relative_to(base);
        }

        Ok(manifest)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if let ModelSource::Local { path } = &mut self.source {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(labels_path) = &mut self.labels_path {
            if labels_path.is_relative() {
                *labels_path = base.join(&*labels_path);
            }
        }
    }

    /// Declared input geometry
    pub fn geometry(&self) -> InputGeometry {
        InputGeometry::new(self.input.width, self.input.height)
    }

    /// Labels from the manifest or its label file
    pub fn resolve_labels(&self) -> Result<Vec<String>> {
        let labels = if !self.labels.is_empty() {
            self.labels.clone()
        } else if let Some(path) = &self.labels_path {
            std::fs::read_to_string(path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        if labels.is_empty() {
            return Err(Error::config(format!(
                "model '{}' declares no labels",
                self.name
            )));
        }

        Ok(labels)
    }
}

/// Model source location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from local filesystem
    Local { path: PathBuf },

    /// Download from Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
        #[serde(default = "default_weights_file")]
        filename: String,
    },
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_weights_file() -> String {
    "model.safetensors".to_string()
}

/// Input image size
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
}

/// Per-channel mean and standard deviation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalization {
    /// ImageNet statistics
    fn default() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}
