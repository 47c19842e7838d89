use crate::OpsbookError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MOUNT_MODE: u32 = 0o755;

/// A mount table entry: `device mount_point fstype options dump pass`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountEntry {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub fstype: String,
    pub options: Vec<String>,
    pub dump: u32,
    pub pass: u32,
}

impl MountEntry {
    /// The entry every prepared volume gets: type detected at mount time, `relatime`.
    pub fn volume(device: impl Into<PathBuf>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            mount_point: mount_point.into(),
            fstype: "auto".to_string(),
            options: vec!["relatime".to_string()],
            dump: 0,
            pass: 2,
        }
    }

    pub fn options_string(&self) -> String {
        if self.options.is_empty() {
            "defaults".to_string()
        } else {
            self.options.join(",")
        }
    }

    /// Render as one fstab line, without a trailing newline. Device and
    /// mount point are octal-escaped so each stays a single field.
    pub fn to_fstab_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            escape_field(&self.device.to_string_lossy()),
            escape_field(&self.mount_point.to_string_lossy()),
            self.fstype,
            self.options_string(),
            self.dump,
            self.pass
        )
    }
}

/// Escape a field the way fstab and `/proc/mounts` do: space, tab, newline
/// and backslash become `\040`, `\011`, `\012` and `\134`.
pub fn escape_field(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            ' ' => escaped.push_str("\\040"),
            '\t' => escaped.push_str("\\011"),
            '\n' => escaped.push_str("\\012"),
            '\\' => escaped.push_str("\\134"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Reverse of [`escape_field`]. Any `\NNN` octal sequence is decoded;
/// anything else is kept as written.
pub fn unescape_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_escape(&bytes[i + 1..i + 4]) {
            let digits = &bytes[i + 1..i + 4];
            out.push((digits[0] - b'0') * 64 + (digits[1] - b'0') * 8 + (digits[2] - b'0'));
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_escape(digits: &[u8]) -> bool {
    digits.len() == 3
        && (b'0'..=b'3').contains(&digits[0])
        && digits[1..].iter().all(|d| (b'0'..=b'7').contains(d))
}

#[async_trait::async_trait]
pub trait MountProvider: Send + Sync {
    /// Create the directory (and parents) and apply `mode`.
    async fn create_mount_point(&self, path: &Path, mode: u32) -> Result<(), OpsbookError>;

    /// Make the mount persistent across reboots.
    async fn enable(&self, entry: &MountEntry) -> Result<(), OpsbookError>;

    /// Mount now. A no-op when already mounted.
    async fn mount(&self, entry: &MountEntry) -> Result<(), OpsbookError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_entry_defaults() {
        let entry = MountEntry::volume("/dev/xvdf", "/asdf");
        assert_eq!(entry.fstype, "auto");
        assert_eq!(entry.options, vec!["relatime".to_string()]);
        assert_eq!(entry.to_fstab_line(), "/dev/xvdf /asdf auto relatime 0 2");
    }

    #[test]
    fn test_empty_options_render_defaults() {
        let mut entry = MountEntry::volume("/dev/xvdg", "/data");
        entry.options.clear();
        assert_eq!(entry.options_string(), "defaults");
    }

    #[test]
    fn test_mount_point_with_space_stays_one_field() {
        let entry = MountEntry::volume("/dev/xvdf", "/mnt/my data");
        let line = entry.to_fstab_line();
        assert_eq!(line, "/dev/xvdf /mnt/my\\040data auto relatime 0 2");
        assert_eq!(line.split_whitespace().count(), 6);
    }

    #[test]
    fn test_escape_round_trips_special_characters() {
        let raw = "/mnt/a b\tc\\d";
        let escaped = escape_field(raw);
        assert_eq!(escaped, "/mnt/a\\040b\\011c\\134d");
        assert_eq!(unescape_field(&escaped), raw);
        assert_eq!(unescape_field("/plain/path"), "/plain/path");
        // Not an octal escape; left alone.
        assert_eq!(unescape_field("/odd\\9x"), "/odd\\9x");
    }
}
