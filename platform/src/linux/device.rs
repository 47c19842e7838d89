use opsbook_core::{DeviceInspector, DeviceState};
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use tokio::process::Command;

/// `blkid` exit status when no signature matched the requested tag.
const BLKID_NO_MATCH: i32 = 2;

/// Probes devices with `blkid -s TYPE -o value <device>`.
pub struct LinuxDeviceInspector {
    blkid: String,
}

impl LinuxDeviceInspector {
    pub fn new() -> Self {
        Self {
            blkid: "blkid".to_string(),
        }
    }

    /// Map a finished `blkid` run onto a device state.
    pub fn parse_probe_output(code: Option<i32>, stdout: &str, stderr: &str) -> DeviceState {
        match code {
            Some(0) => {
                let fs_type = stdout.trim();
                if fs_type.is_empty() {
                    DeviceState::unformatted()
                } else {
                    DeviceState::formatted(fs_type)
                }
            }
            Some(BLKID_NO_MATCH) => DeviceState::unformatted(),
            Some(code) => DeviceState::probe_failed(format!(
                "blkid exited with {}: {}",
                code,
                stderr.trim()
            )),
            None => DeviceState::probe_failed("blkid was terminated by a signal"),
        }
    }
}

impl Default for LinuxDeviceInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceInspector for LinuxDeviceInspector {
    async fn is_block_device(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.file_type().is_block_device())
            .unwrap_or(false)
    }

    async fn inspect(&self, device: &Path) -> DeviceState {
        if !self.is_block_device(device).await {
            log::info!("{} is not a block device", device.display());
            return DeviceState::missing();
        }

        let output = Command::new(&self.blkid)
            .args(["-s", "TYPE", "-o", "value"])
            .arg(device)
            .output()
            .await;

        let state = match output {
            Ok(output) => Self::parse_probe_output(
                output.status.code(),
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
            Err(e) => DeviceState::probe_failed(format!("failed to run {}: {}", self.blkid, e)),
        };

        match (&state.fs_type, &state.probe_error) {
            (Some(fs_type), _) => log::info!("Detected {} filesystem on {}", fs_type, device.display()),
            (None, Some(reason)) => log::warn!("Could not probe {}: {}", device.display(), reason),
            (None, None) => log::info!("No filesystem signature on {}", device.display()),
        }
        state
    }
}
