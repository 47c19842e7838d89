//! Editor for the OS filesystem-types registry (`/etc/filesystems`).
//!
//! The registry is a plain text file with one filesystem type per line. Some
//! platforms consult it, in order, when mounting with an automatic type. A
//! new type goes in front of the legacy `iso9660` entry so it is tried
//! before the CD-ROM probe, or at the end when that entry is absent. Hosts
//! without the file do not use the mechanism and are left alone.

use crate::OpsbookError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_REGISTRY_PATH: &str = "/etc/filesystems";
pub const LEGACY_SENTINEL: &str = "iso9660";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryChange {
    /// No registry file on this host; nothing written.
    Missing,
    /// Type already listed; nothing written.
    AlreadyPresent,
    /// Type written at this line index.
    Inserted { index: usize },
}

impl RegistryChange {
    pub fn wrote(&self) -> bool {
        matches!(self, RegistryChange::Inserted { .. })
    }
}

/// Compute the new entry list, or `None` when `fs_type` is already listed.
pub fn insert_entry(
    entries: &[String],
    fs_type: &str,
    sentinel: &str,
) -> Option<(Vec<String>, usize)> {
    if entries.iter().any(|entry| entry.trim() == fs_type) {
        return None;
    }

    let index = entries
        .iter()
        .position(|entry| entry.trim() == sentinel)
        .unwrap_or(entries.len());

    let mut updated = entries.to_vec();
    updated.insert(index, fs_type.to_string());
    Some((updated, index))
}

pub struct FilesystemRegistry {
    path: PathBuf,
    sentinel: String,
    // Serialises read-modify-write cycles between callers sharing the file.
    lock: Mutex<()>,
}

impl FilesystemRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sentinel: LEGACY_SENTINEL.to_string(),
            lock: Mutex::new(()),
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn entries(&self) -> Result<Vec<String>, OpsbookError> {
        read_entries(&self.path)
    }

    /// What [`ensure_registered`](Self::ensure_registered) would do, without writing.
    pub fn plan(&self, fs_type: &str) -> Result<RegistryChange, OpsbookError> {
        if !self.path.exists() {
            return Ok(RegistryChange::Missing);
        }
        let entries = self.entries()?;
        Ok(match insert_entry(&entries, fs_type, &self.sentinel) {
            Some((_, index)) => RegistryChange::Inserted { index },
            None => RegistryChange::AlreadyPresent,
        })
    }

    /// Make sure `fs_type` is listed, writing the file only when it is not.
    pub fn ensure_registered(&self, fs_type: &str) -> Result<RegistryChange, OpsbookError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| OpsbookError::Registry("registry lock poisoned".to_string()))?;

        ensure_registered(&self.path, fs_type, &self.sentinel)
    }
}

/// Unlocked form of [`FilesystemRegistry::ensure_registered`].
pub fn ensure_registered(
    path: &Path,
    fs_type: &str,
    sentinel: &str,
) -> Result<RegistryChange, OpsbookError> {
    if !path.exists() {
        tracing::debug!("{} does not exist, leaving it alone", path.display());
        return Ok(RegistryChange::Missing);
    }

    let entries = read_entries(path)?;
    let Some((updated, index)) = insert_entry(&entries, fs_type, sentinel) else {
        tracing::debug!("{} already lists {}", path.display(), fs_type);
        return Ok(RegistryChange::AlreadyPresent);
    };

    write_entries(path, &updated)?;
    tracing::info!(
        "Added {} to {} at line {}",
        fs_type,
        path.display(),
        index + 1
    );
    Ok(RegistryChange::Inserted { index })
}

fn read_entries(path: &Path) -> Result<Vec<String>, OpsbookError> {
    let content = fs::read_to_string(path).map_err(|e| {
        OpsbookError::Registry(format!("failed to read {}: {}", path.display(), e))
    })?;
    Ok(content
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect())
}

/// Replace the file atomically. Lines are joined by `\n` with no trailing newline.
fn write_entries(path: &Path, entries: &[String]) -> Result<(), OpsbookError> {
    let registry_err =
        |e: std::io::Error| OpsbookError::Registry(format!("failed to write {}: {}", path.display(), e));

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = fs::metadata(path).map_err(registry_err)?.permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(registry_err)?;
    tmp.write_all(entries.join("\n").as_bytes())
        .map_err(registry_err)?;
    tmp.as_file().sync_all().map_err(registry_err)?;
    fs::set_permissions(tmp.path(), permissions).map_err(registry_err)?;
    tmp.persist(path).map_err(|e| registry_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn registry_file(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filesystems");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_insert_before_sentinel() {
        let (updated, index) = insert_entry(
            &lines(&["ext1", "ext2", "ext3", "iso9660", "ext4"]),
            "xfs",
            LEGACY_SENTINEL,
        )
        .unwrap();
        assert_eq!(updated, lines(&["ext1", "ext2", "ext3", "xfs", "iso9660", "ext4"]));
        assert_eq!(index, 3);
    }

    #[test]
    fn test_append_without_sentinel() {
        let (updated, index) =
            insert_entry(&lines(&["ext1", "ext2", "ext3"]), "xfs", LEGACY_SENTINEL).unwrap();
        assert_eq!(updated, lines(&["ext1", "ext2", "ext3", "xfs"]));
        assert_eq!(index, 3);
    }

    #[test]
    fn test_present_entry_is_left_alone() {
        assert!(insert_entry(&lines(&["ext1", "ext2", "ext3", "xfs"]), "xfs", LEGACY_SENTINEL)
            .is_none());
        assert!(insert_entry(
            &lines(&["ext1", "ext2", "ext3", "iso9660", "xfs", "ext4"]),
            "xfs",
            LEGACY_SENTINEL
        )
        .is_none());
    }

    #[test]
    fn test_first_sentinel_wins() {
        let (updated, _) = insert_entry(
            &lines(&["ext4", "iso9660", "vfat", "iso9660"]),
            "xfs",
            LEGACY_SENTINEL,
        )
        .unwrap();
        assert_eq!(updated, lines(&["ext4", "xfs", "iso9660", "vfat", "iso9660"]));
    }

    #[test]
    fn test_missing_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filesystems");
        let change = ensure_registered(&path, "xfs", LEGACY_SENTINEL).unwrap();
        assert_eq!(change, RegistryChange::Missing);
        assert!(!path.exists());
    }

    #[test]
    fn test_rewrite_joins_without_trailing_newline() {
        let (_dir, path) = registry_file("ext1\next2\next3\niso9660\next4\n");
        let change = ensure_registered(&path, "xfs", LEGACY_SENTINEL).unwrap();
        assert_eq!(change, RegistryChange::Inserted { index: 3 });
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "ext1\next2\next3\nxfs\niso9660\next4"
        );
    }

    #[test]
    fn test_registration_is_idempotent() {
        let (_dir, path) = registry_file("ext1\next2\next3");
        let registry = FilesystemRegistry::new(&path);

        assert!(registry.ensure_registered("xfs").unwrap().wrote());
        let after_first = fs::read_to_string(&path).unwrap();

        assert_eq!(
            registry.ensure_registered("xfs").unwrap(),
            RegistryChange::AlreadyPresent
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
        assert_eq!(registry.entries().unwrap(), lines(&["ext1", "ext2", "ext3", "xfs"]));
    }

    #[test]
    fn test_present_entry_is_not_rewritten() {
        let (_dir, path) = registry_file("ext1\next2\next3\nxfs\n");
        let before = fs::metadata(&path).unwrap().modified().unwrap();
        let change = ensure_registered(&path, "xfs", LEGACY_SENTINEL).unwrap();
        assert_eq!(change, RegistryChange::AlreadyPresent);
        // Trailing newline survives because nothing was written.
        assert_eq!(fs::read_to_string(&path).unwrap(), "ext1\next2\next3\nxfs\n");
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = registry_file("ext4\n");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        ensure_registered(&path, "xfs", LEGACY_SENTINEL).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_plan_does_not_write() {
        let (_dir, path) = registry_file("ext4\niso9660");
        let registry = FilesystemRegistry::new(&path);
        assert_eq!(
            registry.plan("xfs").unwrap(),
            RegistryChange::Inserted { index: 1 }
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "ext4\niso9660");
    }

    #[test]
    fn test_custom_sentinel() {
        let (_dir, path) = registry_file("ext4\nvfat\nhfs");
        let registry = FilesystemRegistry::new(&path).with_sentinel("vfat");
        assert_eq!(
            registry.ensure_registered("xfs").unwrap(),
            RegistryChange::Inserted { index: 1 }
        );
        assert_eq!(registry.entries().unwrap(), lines(&["ext4", "xfs", "vfat", "hfs"]));
    }
}
