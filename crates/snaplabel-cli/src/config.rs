//! Application configuration

use serde::{Deserialize, Serialize};
use snaplabel_classifiers::{CropScale, ServiceConfig};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model manifest to load
    pub manifest: Option<PathBuf>,

    /// Download cache for Hugging Face model sources
    pub model_cache_dir: Option<PathBuf>,

    /// Classification service settings
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Values given on the command line, taking precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub manifest: Option<PathBuf>,
    pub top_k: Option<usize>,
    pub crop: Option<CropScale>,
}

impl AppConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, overrides: &Overrides) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config: Self = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Some(manifest) = &overrides.manifest {
            config.manifest = Some(manifest.clone());
        }
        if let Some(top_k) = overrides.top_k {
            config.service.top_k = top_k;
        }
        if let Some(crop) = overrides.crop {
            config.service.crop_scale = crop;
        }

        config.service.validate()?;
        Ok(config)
    }
}
