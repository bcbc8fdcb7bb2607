use thiserror::Error;

/// Configuration-class failures. None of these are retried; a run that
/// produces one never starts.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    #[error("invalid price matrix: {0}")]
    InvalidPrices(String),

    #[error("shape mismatch: expected {expected} instruments, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
