//! Model providers and the background updater that feeds the registry
//!
//! A provider knows how to produce a ready [`Model`]. The [`ModelUpdater`]
//! loads once at start-up and again every time an update signal arrives,
//! installing each successful load into the [`ModelRegistry`]. Failed loads
//! are logged and leave the current model in place.

use crate::config::ModelManifest;
use crate::model::Model;
use crate::model_loader::ModelLoader;
use crate::registry::ModelRegistry;
use async_trait::async_trait;
use snaplabel_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Source of loaded models
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Produce the newest available model
    async fn load(&self) -> Result<Model>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Loads models described by a manifest file
///
/// The manifest is re-read on every load, so editing it (or replacing the
/// weights it points at) and sending an update signal swaps in the new model.
pub struct ManifestModelProvider {
    manifest_path: PathBuf,
    loader: ModelLoader,
}

impl ManifestModelProvider {
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            loader: ModelLoader::new(),
        }
    }

    /// Use a custom loader (e.g. a different download cache)
    pub fn with_loader(mut self, loader: ModelLoader) -> Self {
        self.loader = loader;
        self
    }
}

#[async_trait]
impl ModelProvider for ManifestModelProvider {
    async fn load(&self) -> Result<Model> {
        let path = self.manifest_path.clone();
        let loader = self.loader.clone();

        // Reading weights and downloads block; keep them off the runtime workers
        tokio::task::spawn_blocking(move || {
            let manifest = ModelManifest::from_file(&path)?;
            loader.load(&manifest)
        })
        .await
        .map_err(|e| Error::internal(format!("model load task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "manifest"
    }
}

/// Notification that a newer model may be available
#[derive(Debug, Clone, Default)]
pub struct UpdateSignal {
    /// Optional reason, logged only
    pub reason: Option<String>,
}

impl UpdateSignal {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

/// Keeps a registry supplied with the provider's latest model
pub struct ModelUpdater;

impl ModelUpdater {
    /// Spawn the update loop
    ///
    /// The loop performs an initial load, then reloads for every signal it
    /// receives. It exits when all senders are dropped.
    pub fn spawn(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ModelRegistry>,
        mut updates: mpsc::Receiver<UpdateSignal>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            Self::refresh(provider.as_ref(), &registry, "initial load").await;

            while let Some(signal) = updates.recv().await {
                let reason = signal.reason.as_deref().unwrap_or("update signal");
                Self::refresh(provider.as_ref(), &registry, reason).await;
            }

            info!("Model update channel closed, stopping {} updater", provider.name());
        })
    }

    /// Load once and install on success
    ///
    /// Returns whether a new model was installed.
    pub async fn refresh(
        provider: &dyn ModelProvider,
        registry: &ModelRegistry,
        reason: &str,
    ) -> bool {
        info!("Loading model from {} provider ({})", provider.name(), reason);

        match provider.load().await {
            Ok(model) => {
                registry.replace(model);
                true
            }
            Err(Error::ModelUnavailable) => {
                warn!("{} provider has no model available", provider.name());
                false
            }
            Err(e) => {
                error!("{} provider failed to load model: {}", provider.name(), e);
                false
            }
        }
    }
}
