//! Snaplabel Classifiers
//!
//! On-device image classification with hot-swappable models.
//!
//! - [`ModelRegistry`] holds the model to use right now and accepts atomic
//!   replacement at any time.
//! - [`ClassificationService`] takes an image plus its orientation, runs
//!   inference off the calling thread against a snapshot of the current
//!   model, and returns the top-K labels.
//! - [`ModelUpdater`] keeps the registry fed from a [`ModelProvider`].

pub mod config;
pub mod model;
pub mod model_loader;
pub mod preprocess;
pub mod provider;
pub mod ranking;
pub mod registry;
pub mod request;
pub mod service;

pub use config::{InputSpec, ModelManifest, ModelSource, Normalization, ServiceConfig};
pub use model::{ImageModel, InputGeometry, Model};
pub use model_loader::{LinearImageModel, ModelLoader};
pub use preprocess::CropScale;
pub use provider::{ManifestModelProvider, ModelProvider, ModelUpdater, UpdateSignal};
pub use registry::{ModelChange, ModelRegistry, SubscriptionId};
pub use request::{ClassificationRequest, ImageInput};
pub use service::{ClassificationService, ClassificationTask};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ServiceConfig;
    pub use crate::model::{ImageModel, InputGeometry, Model};
    pub use crate::registry::ModelRegistry;
    pub use crate::request::ClassificationRequest;
    pub use crate::service::ClassificationService;
    pub use snaplabel_core::prelude::*;
}
