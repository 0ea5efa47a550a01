//! Registry holding the model to use right now
//!
//! The registry is the single owner of the "current model" slot. Readers take
//! a snapshot with [`ModelRegistry::current`]; writers install a new model
//! with [`ModelRegistry::replace`]. Both are lock-free, and a reader always
//! sees either no model or one complete model.

use crate::model::Model;
use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use snaplabel_telemetry::MetricsCollector;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Description of one model replacement, passed to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChange {
    /// Version that was current before the replacement
    pub previous: Option<String>,

    /// Version that is current now
    pub current: String,
}

/// Handle returned by [`ModelRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeHandler = Arc<dyn Fn(&ModelChange) + Send + Sync>;

/// Single source of truth for the active classification model
pub struct ModelRegistry {
    current: ArcSwapOption<Model>,
    observers: RwLock<Vec<(SubscriptionId, ChangeHandler)>>,
    next_subscription: AtomicU64,
    metrics: Option<MetricsCollector>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            observers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            metrics: None,
        }
    }

    /// Count replacements in the given collector
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Install `model` as the current model
    ///
    /// Requests that already took a snapshot keep running against the model
    /// they captured. Observers are notified after the swap, so calling
    /// `current()` from a handler returns the new model.
    pub fn replace(&self, model: Model) {
        self.replace_shared(Arc::new(model));
    }

    /// Install an already shared model as the current model
    pub fn replace_shared(&self, model: Arc<Model>) {
        let version = model.version().to_string();
        let previous = self.current.swap(Some(model));

        let change = ModelChange {
            previous: previous.as_ref().map(|m| m.version().to_string()),
            current: version,
        };

        match &change.previous {
            Some(previous) => info!("Replaced model {} with {}", previous, change.current),
            None => info!("Installed model {}", change.current),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_model_replacement();
        }

        // Release the lock before calling out so handlers may subscribe or read
        let handlers: Vec<ChangeHandler> = self
            .observers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        // A failing observer must not undo or abort the replacement
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&change))).is_err() {
                warn!("Model change observer panicked on {}", change.current);
            }
        }
    }

    /// Snapshot of the current model, or `None` if none was ever installed
    pub fn current(&self) -> Option<Arc<Model>> {
        self.current.load_full()
    }

    /// Whether a model has been installed
    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Version of the current model
    pub fn version(&self) -> Option<String> {
        self.current
            .load()
            .as_ref()
            .map(|model| model.version().to_string())
    }

    /// Register a handler called after every replacement
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ModelChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(handler)));
        debug!("Registered model change observer {:?}", id);
        id
    }

    /// Remove a handler; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageModel, InputGeometry};
    use image::RgbImage;
    use snaplabel_core::{Classification, Result};
    use std::sync::Mutex;

    struct Constant;

    impl ImageModel for Constant {
        fn input_geometry(&self) -> InputGeometry {
            InputGeometry::new(1, 1)
        }

        fn predict(&self, _image: &RgbImage) -> Result<Vec<Classification>> {
            Ok(Vec::new())
        }
    }

    fn model(version: &str) -> Model {
        Model::new("constant", version, Arc::new(Constant)).unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::new();

        assert!(registry.current().is_none());
        assert!(!registry.is_loaded());
        assert_eq!(registry.version(), None);
    }

    #[test]
    fn test_latest_replace_wins() {
        let registry = ModelRegistry::new();

        registry.replace(model("v1"));
        registry.replace(model("v2"));
        registry.replace(model("v3"));

        assert_eq!(registry.current().unwrap().version(), "v3");
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let registry = ModelRegistry::new();
        registry.replace(model("v1"));

        let snapshot = registry.current().unwrap();
        registry.replace(model("v2"));

        assert_eq!(snapshot.version(), "v1");
        assert_eq!(registry.version().as_deref(), Some("v2"));
    }

    #[test]
    fn test_retired_model_released_after_last_reader() {
        let registry = ModelRegistry::new();
        registry.replace(model("v1"));

        let snapshot = registry.current().unwrap();
        let weak = Arc::downgrade(&snapshot);
        registry.replace(model("v2"));

        assert!(weak.upgrade().is_some());
        drop(snapshot);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_observers_see_each_change() {
        let registry = Arc::new(ModelRegistry::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let reader = Arc::clone(&registry);
        registry.subscribe(move |change| {
            // The swap is visible before observers run
            assert_eq!(reader.version().as_deref(), Some(change.current.as_str()));
            sink.lock().unwrap().push(change.clone());
        });

        registry.replace(model("v1"));
        registry.replace(model("v2"));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ModelChange {
                    previous: None,
                    current: "v1".to_string(),
                },
                ModelChange {
                    previous: Some("v1".to_string()),
                    current: "v2".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_panicking_observer_does_not_stop_replacement() {
        let registry = ModelRegistry::new();
        let calls = Arc::new(AtomicU64::new(0));

        registry.subscribe(|change| panic!("observer failed on {}", change.current));
        let counter = Arc::clone(&calls);
        registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.replace(model("v1"));
        registry.replace(model("v2"));

        assert_eq!(registry.version().as_deref(), Some("v2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = ModelRegistry::new();
        let calls = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&calls);
        let id = registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.replace(model("v1"));

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.replace(model("v2"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn test_replacements_counted() {
        let metrics = MetricsCollector::new();
        let registry = ModelRegistry::new().with_metrics(metrics.clone());

        registry.replace(model("v1"));
        registry.replace(model("v2"));

        assert_eq!(metrics.snapshot().model_replacements, 2);
    }
}
