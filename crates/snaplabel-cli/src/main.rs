//! Snaplabel CLI
//!
//! Loads an image classification model from a manifest and classifies image
//! files with it, printing the top predictions for each.

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use snaplabel_classifiers::{
    ClassificationRequest, ClassificationService, ManifestModelProvider, ModelLoader,
    ModelManifest, ModelRegistry, ModelUpdater,
};
use snaplabel_core::Orientation;
use snaplabel_telemetry::MetricsCollector;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod config;

use cli::{Cli, Commands};
use config::{AppConfig, Overrides};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            manifest,
            config,
            top_k,
            crop,
            orientation,
            print_metrics,
            verbose,
            images,
        } => {
            init_tracing(verbose);
            let metrics_handle = if print_metrics {
                Some(init_metrics()?)
            } else {
                None
            };

            let overrides = Overrides {
                manifest,
                top_k,
                crop,
            };
            let config = AppConfig::load(&config, &overrides)?;

            let all_ok = classify(config, orientation, images).await?;

            if let Some(handle) = metrics_handle {
                println!("{}", handle.render());
            }

            Ok(if all_ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Commands::Inspect { manifest, verbose } => {
            init_tracing(verbose);
            inspect(manifest)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Classify every image, returning whether all succeeded
async fn classify(
    config: AppConfig,
    orientation: Orientation,
    images: Vec<PathBuf>,
) -> Result<bool> {
    let manifest = config
        .manifest
        .clone()
        .context("no model manifest given (use --manifest or set `manifest` in the config file)")?;

    let metrics = MetricsCollector::new();
    let registry = Arc::new(ModelRegistry::new().with_metrics(metrics.clone()));

    let provider = ManifestModelProvider::new(&manifest).with_loader(loader(&config));
    if !ModelUpdater::refresh(&provider, &registry, "startup").await {
        anyhow::bail!("failed to load model from {}", manifest.display());
    }

    let service = ClassificationService::new(registry, config.service)?.with_metrics(metrics);
    info!(
        "Classifying {} image(s) with model {}",
        images.len(),
        service.model_version().unwrap_or_default()
    );

    let mut tasks = Vec::with_capacity(images.len());
    for path in &images {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                tasks.push(None);
                continue;
            }
        };

        let request = ClassificationRequest::encoded(bytes)
            .with_orientation(orientation)
            .with_token(path.display().to_string());
        tasks.push(Some(service.classify(request)));
    }

    let mut all_ok = true;
    let outcomes = futures::future::join_all(tasks.into_iter().map(|task| async move {
        match task {
            Some(task) => Some(task.await),
            None => None,
        }
    }))
    .await;

    for (path, outcome) in images.iter().zip(outcomes) {
        println!("{}", path.display());
        match outcome {
            Some(Ok(result)) => println!("{}", result.describe()),
            Some(Err(e)) => {
                all_ok = false;
                println!("  error: {}", e);
            }
            None => {
                all_ok = false;
                println!("  error: unreadable file");
            }
        }
    }

    let snapshot = service.metrics().snapshot();
    info!(
        "Done: {} succeeded, {} failed, avg latency {}us",
        snapshot.successes,
        snapshot.failures(),
        snapshot.avg_latency_us()
    );

    Ok(all_ok)
}

/// Load a model and print what it is
fn inspect(manifest_path: PathBuf) -> Result<()> {
    let manifest = ModelManifest::from_file(&manifest_path)
        .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
    let model = ModelLoader::new().load(&manifest)?;
    let labels = manifest.resolve_labels()?;

    println!("name:    {}", model.name());
    println!("version: {}", model.version());
    println!("input:   {}", model.input_geometry());
    println!("labels:  {}", labels.len());
    for label in labels {
        println!("  {}", label);
    }

    Ok(())
}

fn loader(config: &AppConfig) -> ModelLoader {
    match &config.model_cache_dir {
        Some(dir) => ModelLoader::new().with_cache_dir(dir),
        None => ModelLoader::new(),
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("snaplabel=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snaplabel=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize metrics recorder and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    snaplabel_telemetry::describe_metrics();
    Ok(handle)
}
