//! Classification service: image in, ranked labels out
//!
//! Requests are accepted synchronously and never run inference on the
//! caller's thread. Acceptance validates the request structure and takes a
//! snapshot of the registry's current model; decoding, orientation, crop and
//! scale, inference and ranking then run on the blocking pool against that
//! snapshot, even if a newer model is installed meanwhile.
//!
//! Every outcome, including `InvalidInput` and `ModelUnavailable`, is
//! delivered through the returned [`ClassificationTask`] (or the completion
//! callback of [`ClassificationService::classify_with`]); nothing is reported
//! by panicking.

use crate::config::ServiceConfig;
use crate::model::Model;
use crate::preprocess;
use crate::ranking;
use crate::registry::ModelRegistry;
use crate::request::{ClassificationRequest, ImageInput};
use snaplabel_core::{ClassificationResult, CorrelationToken, Error, Orientation, Result};
use snaplabel_telemetry::MetricsCollector;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Turns images into ranked label lists using the registry's current model
#[derive(Clone)]
pub struct ClassificationService {
    registry: Arc<ModelRegistry>,
    config: Arc<ServiceConfig>,
    runtime: Handle,
    completion: Handle,
    metrics: MetricsCollector,
}

impl ClassificationService {
    /// Create a service bound to the current Tokio runtime
    pub fn new(registry: Arc<ModelRegistry>, config: ServiceConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("no Tokio runtime available: {}", e)))?;
        Self::with_runtime(registry, config, runtime)
    }

    /// Create a service running inference on `runtime`'s blocking pool
    pub fn with_runtime(
        registry: Arc<ModelRegistry>,
        config: ServiceConfig,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            registry,
            config: Arc::new(config),
            completion: runtime.clone(),
            runtime,
            metrics: MetricsCollector::new(),
        })
    }

    /// Run completion callbacks on a different runtime
    pub fn with_completion_runtime(mut self, completion: Handle) -> Self {
        self.completion = completion;
        self
    }

    /// Record traffic into a shared collector
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    /// Accept a request and start classifying it in the background
    ///
    /// Returns immediately. The model is the registry's current model at the
    /// time of this call.
    pub fn classify(&self, request: ClassificationRequest) -> ClassificationTask {
        let ClassificationRequest {
            image,
            orientation,
            token,
        } = request;

        self.metrics.record_request();

        if let Err(e) = image.check() {
            return self.reject(token, e);
        }

        let Some(model) = self.registry.current() else {
            return self.reject(token, Error::ModelUnavailable);
        };

        debug!(
            token = token.as_ref().map(CorrelationToken::as_str),
            model = model.version(),
            "Accepted classification request"
        );

        let config = Arc::clone(&self.config);
        let metrics = self.metrics.clone();

        let handle = self.runtime.spawn_blocking(move || {
            let start = Instant::now();
            let outcome = run(&model, &image, orientation, &config).map(|mut result| {
                result.latency_us = start.elapsed().as_micros() as u64;
                result
            });

            match &outcome {
                Ok(result) => metrics.record_success(result.latency_us),
                Err(e) => {
                    warn!("Classification with model {} failed: {}", model.version(), e);
                    metrics.record_failure(e);
                }
            }

            outcome
        });

        ClassificationTask {
            token,
            state: TaskState::Running(handle),
        }
    }

    /// Callback form of [`classify`](Self::classify)
    ///
    /// `completion` is invoked exactly once, on the completion runtime, with
    /// the request's correlation token and the outcome.
    pub fn classify_with<F>(&self, request: ClassificationRequest, completion: F)
    where
        F: FnOnce(Option<CorrelationToken>, Result<ClassificationResult>) + Send + 'static,
    {
        let mut task = self.classify(request);
        let token = task.token.take();

        self.completion.spawn(async move {
            let outcome = task.await;
            completion(token, outcome);
        });
    }

    /// Version a request accepted now would use
    pub fn model_version(&self) -> Option<String> {
        self.registry.version()
    }

    /// The registry this service reads from
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Service settings
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Traffic counters
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    fn reject(&self, token: Option<CorrelationToken>, error: Error) -> ClassificationTask {
        debug!(
            token = token.as_ref().map(CorrelationToken::as_str),
            "Rejected classification request: {}", error
        );
        self.metrics.record_failure(&error);

        ClassificationTask {
            token,
            state: TaskState::Done(Some(Err(error))),
        }
    }
}

/// Decode, prepare, infer and rank against one model snapshot
fn run(
    model: &Model,
    image: &ImageInput,
    orientation: Orientation,
    config: &ServiceConfig,
) -> Result<ClassificationResult> {
    let decoded = preprocess::decode(image, config.max_image_pixels)?;
    let prepared = preprocess::prepare(
        decoded,
        orientation,
        model.input_geometry(),
        config.crop_scale,
    );

    let raw = catch_unwind(AssertUnwindSafe(|| model.predict(&prepared))).map_err(|panic| {
        Error::inference(format!("model panicked: {}", panic_message(panic.as_ref())))
    })??;

    let ranked = ranking::rank(raw, config.top_k)?;
    Ok(ClassificationResult::new(ranked, model.version()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Pending outcome of one accepted request
///
/// Dropping the task does not cancel the classification; it runs to
/// completion and its result is discarded.
pub struct ClassificationTask {
    token: Option<CorrelationToken>,
    state: TaskState,
}

enum TaskState {
    /// Rejected at acceptance, or already yielded
    Done(Option<Result<ClassificationResult>>),
    Running(JoinHandle<Result<ClassificationResult>>),
}

impl ClassificationTask {
    /// Correlation token supplied with the request
    pub fn token(&self) -> Option<&CorrelationToken> {
        self.token.as_ref()
    }
}

impl Future for ClassificationTask {
    type Output = Result<ClassificationResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            TaskState::Done(outcome) => Poll::Ready(outcome.take().unwrap_or_else(|| {
                Err(Error::internal("classification task polled after completion"))
            })),
            TaskState::Running(handle) => match Pin::new(handle).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(joined) => {
                    let outcome = joined.unwrap_or_else(|e| {
                        Err(Error::internal(format!("classification task failed: {}", e)))
                    });
                    self.state = TaskState::Done(None);
                    Poll::Ready(outcome)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn test_requires_runtime() {
        let registry = Arc::new(ModelRegistry::new());
        let result = ClassificationService::new(registry, ServiceConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let registry = Arc::new(ModelRegistry::new());
        let result = ClassificationService::new(registry, ServiceConfig::default().with_top_k(0));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
