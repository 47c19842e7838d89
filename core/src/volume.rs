use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// One entry of the agent's volume list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    #[serde(default)]
    pub name: String,
    pub device: PathBuf,
    /// `None` (or an empty string in the source document) leaves the volume unmounted.
    #[serde(default, deserialize_with = "non_empty_path")]
    pub mount_point: Option<PathBuf>,
}

impl VolumeSpec {
    pub fn new(name: impl Into<String>, device: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            mount_point: None,
        }
    }

    pub fn with_mount_point(mut self, mount_point: impl Into<PathBuf>) -> Self {
        let mount_point = mount_point.into();
        self.mount_point = if mount_point.as_os_str().is_empty() {
            None
        } else {
            Some(mount_point)
        };
        self
    }

    pub fn mount_point(&self) -> Option<&Path> {
        self.mount_point.as_deref()
    }
}

fn non_empty_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from))
}

/// What a probe found on a device. Computed fresh on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub exists: bool,
    pub fs_type: Option<String>,
    /// Set when the probe itself could not run or returned an unexpected
    /// status, so an unreadable device is not mistaken for a blank one.
    pub probe_error: Option<String>,
}

impl DeviceState {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn unformatted() -> Self {
        Self {
            exists: true,
            ..Self::default()
        }
    }

    pub fn formatted(fs_type: impl Into<String>) -> Self {
        Self {
            exists: true,
            fs_type: Some(fs_type.into()),
            probe_error: None,
        }
    }

    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self {
            exists: true,
            fs_type: None,
            probe_error: Some(reason.into()),
        }
    }

    pub fn has_filesystem(&self) -> bool {
        self.fs_type.is_some()
    }

    pub fn inspection_failed(&self) -> bool {
        self.probe_error.is_some()
    }
}
