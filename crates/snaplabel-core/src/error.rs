//! Error types for snaplabel

/// Result type alias using snaplabel's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for snaplabel operations
///
/// None of these are fatal: a service that reported any of them keeps
/// accepting requests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request image was empty, malformed, or could not be decoded
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No model has been installed yet
    #[error("no classification model is available")]
    ModelUnavailable,

    /// Inference failed inside the model
    #[error("inference error: {0}")]
    Inference(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Model artifact could not be loaded
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest/config parsing errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable short name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::ModelUnavailable => "model_unavailable",
            Self::Inference(_) => "inference",
            Self::Config(_) => "config",
            Self::ModelLoad(_) => "model_load",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(Error::invalid_input("empty").kind(), "invalid_input");
        assert_eq!(Error::ModelUnavailable.kind(), "model_unavailable");
        assert_eq!(Error::inference("nan").kind(), "inference");
    }

    #[test]
    fn test_inference_error_keeps_cause() {
        let err = Error::inference("shape mismatch [3, 224] vs [3, 299]");
        assert!(err.to_string().contains("shape mismatch"));
    }
}
