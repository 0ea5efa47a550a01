use clap::{Parser, Subcommand};
use snaplabel_classifiers::CropScale;
use snaplabel_core::Orientation;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "snaplabel")]
#[command(author, version, about = "Classify images with an on-device model")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify one or more image files
    Classify {
        /// Model manifest (overrides the config file)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long, default_value = "snaplabel.yaml")]
        config: String,

        /// Number of classifications to show per image
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Crop/scale policy: center-crop, scale-fit or scale-fill
        #[arg(long, value_parser = parse_crop)]
        crop: Option<CropScale>,

        /// EXIF orientation (1-8) applied to every image
        #[arg(short, long, default_value = "1", value_parser = parse_orientation)]
        orientation: Orientation,

        /// Print Prometheus metrics after classifying
        #[arg(long)]
        print_metrics: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,

        /// Image files
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Load a model and describe it
    Inspect {
        /// Model manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

fn parse_crop(s: &str) -> Result<CropScale, String> {
    s.parse()
}

fn parse_orientation(s: &str) -> Result<Orientation, String> {
    let value: u32 = s
        .parse()
        .map_err(|_| format!("'{}' is not an EXIF orientation number", s))?;
    Orientation::from_exif(value).ok_or_else(|| format!("orientation must be 1-8, got {}", value))
}
