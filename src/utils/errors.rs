use thiserror::Error;

/// Main error type for Buddy
#[derive(Error, Debug)]
pub enum BuddyError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    ExportError(String),

    #[error("UI error: {0}")]
    UIError(String),
}
