//! Snaplabel Core
//!
//! Core types and error handling shared across snaplabel components.
//!
//! This crate provides:
//! - The error taxonomy reported by classification requests
//! - Image orientation metadata
//! - Classification and ranked result types

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Classification, ClassificationResult, CorrelationToken, Orientation};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{Classification, ClassificationResult, CorrelationToken, Orientation};
}
