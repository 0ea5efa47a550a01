//! Top-K ranking of raw model output

use snaplabel_core::{Classification, Error, Result};
use std::cmp::Ordering;

/// Sort raw classifications by descending confidence and keep the first `k`
///
/// The sort is stable, so equal scores keep the model's label order.
/// Non-finite scores are an inference failure; finite scores are clamped
/// into `[0, 1]`.
pub fn rank(mut raw: Vec<Classification>, k: usize) -> Result<Vec<Classification>> {
    for classification in &mut raw {
        if !classification.confidence.is_finite() {
            return Err(Error::inference(format!(
                "model produced a non-finite score for '{}'",
                classification.label
            )));
        }
        classification.confidence = classification.confidence.clamp(0.0, 1.0);
    }

    raw.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    raw.truncate(k);
    Ok(raw)
}
