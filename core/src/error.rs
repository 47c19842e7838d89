use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpsbookError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device inspection failed: {0}")]
    ProbeFailed(String),

    #[error("Formatting failed: {0}")]
    Format(String),

    #[error("Filesystem registry update failed: {0}")]
    Registry(String),

    #[error("Mount failed: {0}")]
    Mount(String),

    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
