//! Test doubles for the external-process ports. They NEVER touch real hardware.
use crate::{DeviceInspector, DeviceState, MountEntry, MountProvider, OpsbookError, VolumeFormatter};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Inspector backed by a fixed table of device states.
#[derive(Clone, Default)]
pub struct MockDeviceInspector {
    devices: HashMap<PathBuf, DeviceState>,
    inspected: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockDeviceInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, path: impl Into<PathBuf>, state: DeviceState) -> Self {
        self.devices.insert(path.into(), state);
        self
    }

    pub fn inspected(&self) -> Vec<PathBuf> {
        self.inspected.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DeviceInspector for MockDeviceInspector {
    async fn is_block_device(&self, path: &Path) -> bool {
        self.devices.get(path).map_or(false, |state| state.exists)
    }

    async fn inspect(&self, device: &Path) -> DeviceState {
        self.inspected.lock().unwrap().push(device.to_path_buf());
        self.devices.get(device).cloned().unwrap_or_default()
    }
}

/// Formatter that records every request instead of running mkfs.
#[derive(Clone, Default)]
pub struct MockFormatter {
    history: Arc<Mutex<Vec<(PathBuf, String)>>>,
    failing: HashSet<PathBuf>,
    tool_missing: bool,
}

impl MockFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, device: impl Into<PathBuf>) -> Self {
        self.failing.insert(device.into());
        self
    }

    pub fn without_tools(mut self) -> Self {
        self.tool_missing = true;
        self
    }

    pub fn history(&self) -> Vec<(PathBuf, String)> {
        self.history.lock().unwrap().clone()
    }

    pub fn format_count(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    pub fn was_formatted(&self, device: &str) -> bool {
        self.history
            .lock()
            .unwrap()
            .iter()
            .any(|(path, _)| path == Path::new(device))
    }
}

#[async_trait::async_trait]
impl VolumeFormatter for MockFormatter {
    fn required_tools(&self, fs_type: &str) -> Vec<String> {
        vec![format!("mkfs.{}", fs_type)]
    }

    async fn check_available(&self, fs_type: &str) -> Result<(), OpsbookError> {
        if self.tool_missing {
            return Err(OpsbookError::ToolNotFound(format!("mkfs.{}", fs_type)));
        }
        Ok(())
    }

    async fn format(&self, device: &Path, fs_type: &str) -> Result<(), OpsbookError> {
        if self.failing.contains(device) {
            return Err(OpsbookError::Format(format!(
                "mkfs -t {} {} exited with 1",
                fs_type,
                device.display()
            )));
        }
        self.history
            .lock()
            .unwrap()
            .push((device.to_path_buf(), fs_type.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    CreateMountPoint { path: PathBuf, mode: u32 },
    Enable(MountEntry),
    Mount(MountEntry),
}

/// Mount provider that records calls in order.
#[derive(Clone, Default)]
pub struct MockMountProvider {
    calls: Arc<Mutex<Vec<MountCall>>>,
    failing: HashSet<PathBuf>,
}

impl MockMountProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `mount` for this mount point.
    pub fn failing_on(mut self, mount_point: impl Into<PathBuf>) -> Self {
        self.failing.insert(mount_point.into());
        self
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mounted(&self) -> Vec<MountEntry> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MountCall::Mount(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }

    pub fn enabled(&self) -> Vec<MountEntry> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MountCall::Enable(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl MountProvider for MockMountProvider {
    async fn create_mount_point(&self, path: &Path, mode: u32) -> Result<(), OpsbookError> {
        self.calls.lock().unwrap().push(MountCall::CreateMountPoint {
            path: path.to_path_buf(),
            mode,
        });
        Ok(())
    }

    async fn enable(&self, entry: &MountEntry) -> Result<(), OpsbookError> {
        self.calls.lock().unwrap().push(MountCall::Enable(entry.clone()));
        Ok(())
    }

    async fn mount(&self, entry: &MountEntry) -> Result<(), OpsbookError> {
        if self.failing.contains(&entry.mount_point) {
            return Err(OpsbookError::Mount(format!(
                "mount {} {} exited with 32",
                entry.device.display(),
                entry.mount_point.display()
            )));
        }
        self.calls.lock().unwrap().push(MountCall::Mount(entry.clone()));
        Ok(())
    }
}
