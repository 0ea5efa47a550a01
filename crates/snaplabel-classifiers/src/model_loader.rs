//! Model loading for Candle-based image classifiers

use crate::config::{ModelManifest, ModelSource, Normalization};
use crate::model::{ImageModel, InputGeometry, Model};
use candle_core::{DType, Device, Tensor, D};
use image::RgbImage;
use snaplabel_core::{Classification, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Dense softmax classifier over normalized RGB pixels
///
/// Weights are a `[labels, 3 * height * width]` matrix over the
/// channel-major (CHW) pixel vector plus a `[labels]` bias.
pub struct LinearImageModel {
    /// Transposed weights, `[features, labels]`, kept contiguous for matmul
    weight_t: Tensor,
    bias: Tensor,
    labels: Vec<String>,
    geometry: InputGeometry,
    normalization: Normalization,
    device: Device,
}

impl LinearImageModel {
    /// Build from in-memory tensors
    pub fn from_tensors(
        weight: Tensor,
        bias: Tensor,
        labels: Vec<String>,
        geometry: InputGeometry,
        normalization: Normalization,
    ) -> Result<Self> {
        let features = 3 * geometry.pixels();
        let expected_weight = [labels.len(), features];

        if weight.dims() != expected_weight {
            return Err(Error::model_load(format!(
                "weight shape {:?} does not match {} labels x {} features",
                weight.dims(),
                labels.len(),
                features
            )));
        }
        if bias.dims() != [labels.len()] {
            return Err(Error::model_load(format!(
                "bias shape {:?} does not match {} labels",
                bias.dims(),
                labels.len()
            )));
        }

        let device = weight.device().clone();
        let weight_t = weight
            .to_dtype(DType::F32)
            .and_then(|w| w.t())
            .and_then(|w| w.contiguous())
            .map_err(|e| Error::model_load(format!("failed to prepare weights: {}", e)))?;
        let bias = bias
            .to_dtype(DType::F32)
            .map_err(|e| Error::model_load(format!("failed to prepare bias: {}", e)))?;

        Ok(Self {
            weight_t,
            bias,
            labels,
            geometry,
            normalization,
            device,
        })
    }

    /// Load `weight` and `bias` tensors from a SafeTensors file
    pub fn from_safetensors(
        path: &Path,
        labels: Vec<String>,
        geometry: InputGeometry,
        normalization: Normalization,
    ) -> Result<Self> {
        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)
            .map_err(|e| Error::model_load(format!("failed to load SafeTensors: {}", e)))?;

        let weight = tensors
            .remove("weight")
            .ok_or_else(|| Error::model_load("SafeTensors file has no 'weight' tensor"))?;
        let bias = tensors
            .remove("bias")
            .ok_or_else(|| Error::model_load("SafeTensors file has no 'bias' tensor"))?;

        Self::from_tensors(weight, bias, labels, geometry, normalization)
    }

    /// Class labels in output order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Normalized CHW pixel vector as a `[1, features]` tensor
    fn input_tensor(&self, image: &RgbImage) -> candle_core::Result<Tensor> {
        let Normalization { mean, std } = self.normalization;
        let pixels = image.width() as usize * image.height() as usize;
        let mut data = Vec::with_capacity(3 * pixels);

        for channel in 0..3 {
            data.extend(
                image
                    .pixels()
                    .map(|p| (p[channel] as f32 / 255.0 - mean[channel]) / std[channel]),
            );
        }

        Tensor::from_vec(data, (1, 3 * pixels), &self.device)
    }

    fn forward(&self, image: &RgbImage) -> candle_core::Result<Vec<f32>> {
        let input = self.input_tensor(image)?;
        let logits = input.matmul(&self.weight_t)?.broadcast_add(&self.bias)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        probs.squeeze(0)?.to_vec1::<f32>()
    }
}

impl ImageModel for LinearImageModel {
    fn input_geometry(&self) -> InputGeometry {
        self.geometry
    }

    fn predict(&self, image: &RgbImage) -> Result<Vec<Classification>> {
        if image.dimensions() != (self.geometry.width, self.geometry.height) {
            return Err(Error::inference(format!(
                "expected a {} image, got {}x{}",
                self.geometry,
                image.width(),
                image.height()
            )));
        }

        let probs = self
            .forward(image)
            .map_err(|e| Error::inference(format!("forward pass failed: {}", e)))?;

        Ok(self
            .labels
            .iter()
            .zip(probs)
            .map(|(label, score)| Classification::new(label.clone(), score))
            .collect())
    }
}

/// Builds models from manifests
#[derive(Debug, Clone, Default)]
pub struct ModelLoader {
    /// Download cache for Hugging Face sources
    cache_dir: Option<PathBuf>,
}

impl ModelLoader {
    /// Create a loader using the default Hugging Face cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific download cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Load the model a manifest describes
    pub fn load(&self, manifest: &ModelManifest) -> Result<Model> {
        let weights_path = self.resolve_weights(&manifest.source)?;
        let labels = manifest.resolve_labels()?;

        debug!(
            "Loading model '{}' ({} labels) from {}",
            manifest.name,
            labels.len(),
            weights_path.display()
        );

        let linear = LinearImageModel::from_safetensors(
            &weights_path,
            labels,
            manifest.geometry(),
            manifest.normalization,
        )?;

        let model = Model::new(&manifest.name, &manifest.version, Arc::new(linear))?;
        info!("Loaded model {} version {}", model.name(), model.version());
        Ok(model)
    }

    /// Resolve the weights file, downloading if needed
    fn resolve_weights(&self, source: &ModelSource) -> Result<PathBuf> {
        match source {
            ModelSource::Local { path } => {
                if !path.exists() {
                    return Err(Error::model_load(format!(
                        "model file not found: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            ModelSource::HuggingFace {
                repo,
                revision,
                filename,
            } => self.download(repo, revision, filename),
        }
    }

    #[cfg(feature = "hf-hub")]
    fn download(&self, repo: &str, revision: &str, filename: &str) -> Result<PathBuf> {
        use hf_hub::api::sync::ApiBuilder;
        use hf_hub::{Repo, RepoType};

        info!("Fetching {} from Hugging Face: {} @ {}", filename, repo, revision);

        let mut builder = ApiBuilder::new();
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder
            .build()
            .map_err(|e| Error::model_load(format!("failed to initialize HF API: {}", e)))?;

        api.repo(Repo::with_revision(
            repo.to_string(),
            RepoType::Model,
            revision.to_string(),
        ))
        .get(filename)
        .map_err(|e| Error::model_load(format!("failed to download model from HF: {}", e)))
    }

    #[cfg(not(feature = "hf-hub"))]
    fn download(&self, repo: &str, _revision: &str, _filename: &str) -> Result<PathBuf> {
        Err(Error::model_load(format!(
            "cannot fetch '{}': built without Hugging Face support",
            repo
        )))
    }
}
