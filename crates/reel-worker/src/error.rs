//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// How the orchestrator treats a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Recovered with a placeholder; the item continues
    Generation,
    /// Recovered by recording no URL; the batch continues
    Upload,
    /// Stops the batch
    Fatal,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Normalization failed: {0}")]
    NormalizationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fatal error: {0}")]
    Fatal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn normalization_failed(msg: impl Into<String>) -> Self {
        Self::NormalizationFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Classify the error for the continuation policy.
    ///
    /// Normalization failures share the upload recovery point: the item
    /// ends without a URL and the batch moves on.
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkerError::GenerationFailed(_) => FailureKind::Generation,
            WorkerError::NormalizationFailed(_) | WorkerError::Storage(_) => FailureKind::Upload,
            WorkerError::ConfigError(_) | WorkerError::Fatal(_) | WorkerError::Io(_) => {
                FailureKind::Fatal
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == FailureKind::Fatal
    }
}
