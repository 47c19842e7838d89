use crate::OpsbookError;
use std::path::Path;

/// Writes a fresh filesystem onto a raw device. Destructive.
#[async_trait::async_trait]
pub trait VolumeFormatter: Send + Sync {
    /// External tools that must be present to format as `fs_type`.
    fn required_tools(&self, fs_type: &str) -> Vec<String>;

    /// Fails with `ToolNotFound` when a required tool is missing.
    async fn check_available(&self, fs_type: &str) -> Result<(), OpsbookError>;

    async fn format(&self, device: &Path, fs_type: &str) -> Result<(), OpsbookError>;
}
