//! Mounting through `/etc/fstab` and `mount(8)`.
//!
//! Enabling writes the fstab entry so the volume comes back after a reboot;
//! mounting attaches it now. Both are idempotent.

use opsbook_core::{unescape_field, MountEntry, MountProvider, OpsbookError};
use std::fs;
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const FSTAB_PATH: &str = "/etc/fstab";
pub const PROC_MOUNTS_PATH: &str = "/proc/mounts";

/// What the live mount table holds at a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounted,
    /// Another device is mounted there.
    Occupied { device: String },
}

pub struct LinuxMountProvider {
    fstab: PathBuf,
    proc_mounts: PathBuf,
    mount_command: String,
}

impl LinuxMountProvider {
    pub fn new() -> Self {
        Self::with_paths(FSTAB_PATH, PROC_MOUNTS_PATH)
    }

    /// Point at alternative fstab and mount-table files.
    pub fn with_paths(fstab: impl Into<PathBuf>, proc_mounts: impl Into<PathBuf>) -> Self {
        Self {
            fstab: fstab.into(),
            proc_mounts: proc_mounts.into(),
            mount_command: "mount".to_string(),
        }
    }

    /// Use a different mount binary, e.g. an absolute path.
    pub fn with_mount_command(mut self, command: impl Into<String>) -> Self {
        self.mount_command = command.into();
        self
    }

    /// Add or replace the line for `entry.mount_point`. `None` when the
    /// table already holds exactly this entry.
    pub fn update_fstab(content: &str, entry: &MountEntry) -> Option<String> {
        let wanted = entry.to_fstab_line();
        let mount_point = entry.mount_point.to_string_lossy().into_owned();
        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

        let existing = lines.iter().position(|line| {
            let line = line.trim();
            !line.starts_with('#')
                && line
                    .split_whitespace()
                    .nth(1)
                    .map_or(false, |target| unescape_field(target) == mount_point)
        });

        match existing {
            Some(index) => {
                let current: Vec<&str> = lines[index].split_whitespace().collect();
                let desired: Vec<&str> = wanted.split_whitespace().collect();
                if current == desired {
                    return None;
                }
                lines[index] = wanted;
            }
            None => lines.push(wanted),
        }

        let mut updated = lines.join("\n");
        updated.push('\n');
        Some(updated)
    }

    /// Look `entry.mount_point` up in a `/proc/mounts` style table. When
    /// mounts are stacked the last line wins.
    pub fn mount_state(mounts: &str, entry: &MountEntry) -> MountState {
        let mount_point = entry.mount_point.to_string_lossy().into_owned();
        mounts
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = unescape_field(fields.next()?);
                let target = unescape_field(fields.next()?);
                (target == mount_point).then_some(device)
            })
            .last()
            .map_or(MountState::Unmounted, |device| {
                if same_device(Path::new(&device), &entry.device) {
                    MountState::Mounted
                } else {
                    MountState::Occupied { device }
                }
            })
    }

    fn write_fstab(&self, content: &str) -> Result<(), OpsbookError> {
        let mount_err = |e: std::io::Error| {
            OpsbookError::Mount(format!("failed to write {}: {}", self.fstab.display(), e))
        };

        let dir = self
            .fstab
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let permissions = match fs::metadata(&self.fstab) {
            Ok(meta) => meta.permissions(),
            Err(_) => fs::Permissions::from_mode(0o644),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(mount_err)?;
        tmp.write_all(content.as_bytes()).map_err(mount_err)?;
        tmp.as_file().sync_all().map_err(mount_err)?;
        fs::set_permissions(tmp.path(), permissions).map_err(mount_err)?;
        tmp.persist(&self.fstab).map_err(|e| mount_err(e.error))?;
        Ok(())
    }
}

impl Default for LinuxMountProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MountProvider for LinuxMountProvider {
    async fn create_mount_point(&self, path: &Path, mode: u32) -> Result<(), OpsbookError> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|e| {
                OpsbookError::Mount(format!("failed to create {}: {}", path.display(), e))
            })?;
        // The umask may have narrowed the mode.
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
            OpsbookError::Mount(format!("failed to chmod {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    async fn enable(&self, entry: &MountEntry) -> Result<(), OpsbookError> {
        let content = match fs::read_to_string(&self.fstab) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(OpsbookError::Mount(format!(
                    "failed to read {}: {}",
                    self.fstab.display(),
                    e
                )))
            }
        };

        match Self::update_fstab(&content, entry) {
            Some(updated) => {
                self.write_fstab(&updated)?;
                log::info!("Enabled {} in {}", entry.to_fstab_line(), self.fstab.display());
            }
            None => log::debug!("{} already in {}", entry.to_fstab_line(), self.fstab.display()),
        }
        Ok(())
    }

    async fn mount(&self, entry: &MountEntry) -> Result<(), OpsbookError> {
        let mounts = fs::read_to_string(&self.proc_mounts).map_err(|e| {
            OpsbookError::Mount(format!("failed to read {}: {}", self.proc_mounts.display(), e))
        })?;
        match Self::mount_state(&mounts, entry) {
            MountState::Mounted => {
                log::info!("{} is already mounted", entry.mount_point.display());
                return Ok(());
            }
            MountState::Occupied { device } => {
                return Err(OpsbookError::Mount(format!(
                    "{} is already mounted from {}",
                    entry.mount_point.display(),
                    device
                )));
            }
            MountState::Unmounted => {}
        }

        log::info!(
            "Mounting {} at {}",
            entry.device.display(),
            entry.mount_point.display()
        );
        let output = Command::new(&self.mount_command)
            .args(["-t", entry.fstype.as_str(), "-o", entry.options_string().as_str()])
            .arg(&entry.device)
            .arg(&entry.mount_point)
            .output()
            .await
            .map_err(|e| {
                OpsbookError::Mount(format!("failed to start {}: {}", self.mount_command, e))
            })?;

        if !output.status.success() {
            return Err(OpsbookError::Mount(format!(
                "mount {} {} failed with exit code {:?}: {}",
                entry.device.display(),
                entry.mount_point.display(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Same path, or both resolve to the same node (e.g. `/dev/xvdf` linked to
/// `/dev/nvme1n1`).
fn same_device(reported: &Path, wanted: &Path) -> bool {
    if reported == wanted {
        return true;
    }
    match (fs::canonicalize(reported), fs::canonicalize(wanted)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> MountEntry {
        MountEntry::volume("/dev/xvdf", "/asdf")
    }

    #[test]
    fn test_fstab_appends_entry() {
        let content = "# /etc/fstab\nLABEL=/ / ext4 defaults,noatime 1 1\n";
        let updated = LinuxMountProvider::update_fstab(content, &entry()).unwrap();
        assert_eq!(
            updated,
            "# /etc/fstab\nLABEL=/ / ext4 defaults,noatime 1 1\n/dev/xvdf /asdf auto relatime 0 2\n"
        );
    }

    #[test]
    fn test_fstab_entry_is_idempotent() {
        let content = "LABEL=/ / ext4 defaults 1 1\n/dev/xvdf   /asdf  auto relatime 0 2\n";
        assert!(LinuxMountProvider::update_fstab(content, &entry()).is_none());
    }

    #[test]
    fn test_fstab_replaces_stale_entry() {
        let content = "/dev/xvdg /asdf xfs defaults 0 0\n/dev/xvdh /data ext4 defaults 0 2";
        let updated = LinuxMountProvider::update_fstab(content, &entry()).unwrap();
        assert_eq!(
            updated,
            "/dev/xvdf /asdf auto relatime 0 2\n/dev/xvdh /data ext4 defaults 0 2\n"
        );
    }

    #[test]
    fn test_fstab_ignores_comments() {
        let content = "#/dev/xvdf /asdf auto relatime 0 2\n";
        let updated = LinuxMountProvider::update_fstab(content, &entry()).unwrap();
        assert!(updated.ends_with("\n/dev/xvdf /asdf auto relatime 0 2\n"));
    }

    #[test]
    fn test_mount_state() {
        let mounts = "proc /proc proc rw 0 0\n/dev/xvdf /asdf xfs rw,relatime 0 0\n";
        assert_eq!(
            LinuxMountProvider::mount_state(mounts, &entry()),
            MountState::Mounted
        );
        assert_eq!(
            LinuxMountProvider::mount_state("proc /proc proc rw 0 0\n", &entry()),
            MountState::Unmounted
        );
        assert_eq!(
            LinuxMountProvider::mount_state("/dev/xvdf /asdf2 xfs rw 0 0\n", &entry()),
            MountState::Unmounted
        );
    }

    #[test]
    fn test_other_device_occupies_mount_point() {
        assert_eq!(
            LinuxMountProvider::mount_state("/dev/xvdg /asdf ext4 rw 0 0\n", &entry()),
            MountState::Occupied {
                device: "/dev/xvdg".to_string()
            }
        );
        // Our device stacked on top of another one counts as mounted.
        let stacked = "/dev/xvdg /asdf ext4 rw 0 0\n/dev/xvdf /asdf xfs rw 0 0\n";
        assert_eq!(
            LinuxMountProvider::mount_state(stacked, &entry()),
            MountState::Mounted
        );
    }

    #[test]
    fn test_mount_point_with_space() {
        let entry = MountEntry::volume("/dev/xvdf", "/mnt/my data");
        assert_eq!(
            LinuxMountProvider::mount_state("/dev/xvdf /mnt/my\\040data xfs rw 0 0\n", &entry),
            MountState::Mounted
        );

        let updated = LinuxMountProvider::update_fstab("", &entry).unwrap();
        assert_eq!(updated, "/dev/xvdf /mnt/my\\040data auto relatime 0 2\n");
        assert!(LinuxMountProvider::update_fstab(&updated, &entry).is_none());
    }
}
