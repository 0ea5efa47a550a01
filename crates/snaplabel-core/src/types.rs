//! Core types for snaplabel

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel orientation of a decoded image, as the 8 EXIF orientation values
///
/// The variant names describe where the top of the picture ended up in the
/// stored pixels, so `Right` (EXIF 6) needs a 90 degree clockwise turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// EXIF 1, already upright
    #[default]
    Up,
    /// EXIF 2, mirrored left to right
    UpMirrored,
    /// EXIF 3, rotated 180 degrees
    Down,
    /// EXIF 4, mirrored top to bottom
    DownMirrored,
    /// EXIF 5, transposed
    LeftMirrored,
    /// EXIF 6, needs a 90 degree clockwise turn
    Right,
    /// EXIF 7, transversed
    RightMirrored,
    /// EXIF 8, needs a 90 degree counter-clockwise turn
    Left,
}

impl Orientation {
    /// Parse an EXIF orientation tag value (1-8)
    pub fn from_exif(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            2 => Some(Self::UpMirrored),
            3 => Some(Self::Down),
            4 => Some(Self::DownMirrored),
            5 => Some(Self::LeftMirrored),
            6 => Some(Self::Right),
            7 => Some(Self::RightMirrored),
            8 => Some(Self::Left),
            _ => None,
        }
    }

    /// The EXIF tag value for this orientation
    pub fn exif_value(&self) -> u32 {
        match self {
            Self::Up => 1,
            Self::UpMirrored => 2,
            Self::Down => 3,
            Self::DownMirrored => 4,
            Self::LeftMirrored => 5,
            Self::Right => 6,
            Self::RightMirrored => 7,
            Self::Left => 8,
        }
    }

    /// Whether making the image upright swaps its width and height
    pub fn swaps_dimensions(&self) -> bool {
        self.exif_value() >= 5
    }
}

/// A single (label, confidence) pair produced by inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Class label
    pub label: String,

    /// Confidence score (0.0-1.0)
    pub confidence: f32,
}

impl Classification {
    /// Create a new classification
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Ranked outcome of one classification request
///
/// Entries are sorted by descending confidence and hold at most the
/// configured top-K. An empty result means the model produced nothing; it is
/// not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Ranked classifications
    pub classifications: Vec<Classification>,

    /// Version of the model that produced this result
    pub model_version: String,

    /// Time spent decoding, preprocessing and running inference
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a result from already ranked classifications
    pub fn new(classifications: Vec<Classification>, model_version: impl Into<String>) -> Self {
        Self {
            classifications,
            model_version: model_version.into(),
            latency_us: 0,
        }
    }

    /// Number of retained classifications
    pub fn len(&self) -> usize {
        self.classifications.len()
    }

    /// Whether the model produced no classifications
    pub fn is_empty(&self) -> bool {
        self.classifications.is_empty()
    }

    /// Highest-confidence classification, if any
    pub fn top(&self) -> Option<&Classification> {
        self.classifications.first()
    }

    /// Iterate over the ranked classifications
    pub fn iter(&self) -> impl Iterator<Item = &Classification> {
        self.classifications.iter()
    }

    /// Human-readable listing, one `  (0.375) label` line per entry
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "No Classifications".to_string();
        }

        self.classifications
            .iter()
            .map(|c| format!("  ({:.3}) {}", c.confidence, c.label))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Opaque caller-supplied token echoed back with the completion
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(pub String);

impl CorrelationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
