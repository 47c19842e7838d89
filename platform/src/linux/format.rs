use opsbook_core::{OpsbookError, VolumeFormatter};
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;

/// Formats through `mkfs -t <fstype> <device>`.
pub struct MkfsFormatter {
    mkfs: String,
}

impl MkfsFormatter {
    pub fn new() -> Self {
        Self::with_mkfs("mkfs")
    }

    /// Use a different mkfs front end, e.g. an absolute path.
    pub fn with_mkfs(mkfs: impl Into<String>) -> Self {
        Self { mkfs: mkfs.into() }
    }

    pub fn command_args(device: &Path, fs_type: &str) -> Vec<OsString> {
        vec![
            OsString::from("-t"),
            OsString::from(fs_type),
            device.as_os_str().to_os_string(),
        ]
    }
}

impl Default for MkfsFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VolumeFormatter for MkfsFormatter {
    fn required_tools(&self, fs_type: &str) -> Vec<String> {
        // The mkfs front end dispatches to mkfs.<fstype>.
        vec![self.mkfs.clone(), format!("mkfs.{}", fs_type)]
    }

    async fn check_available(&self, fs_type: &str) -> Result<(), OpsbookError> {
        for tool in self.required_tools(fs_type) {
            which::which(&tool).map_err(|_| OpsbookError::ToolNotFound(tool.clone()))?;
        }
        Ok(())
    }

    async fn format(&self, device: &Path, fs_type: &str) -> Result<(), OpsbookError> {
        if !super::is_root() {
            log::warn!("Not running as root, mkfs on {} will probably fail", device.display());
        }

        log::info!("Running {} -t {} {}", self.mkfs, fs_type, device.display());
        let output = Command::new(&self.mkfs)
            .args(Self::command_args(device, fs_type))
            .output()
            .await
            .map_err(|e| OpsbookError::Format(format!("failed to start {}: {}", self.mkfs, e)))?;

        if !output.status.success() {
            return Err(OpsbookError::Format(format!(
                "{} -t {} {} failed with exit code {:?}: {}",
                self.mkfs,
                fs_type,
                device.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }
}
