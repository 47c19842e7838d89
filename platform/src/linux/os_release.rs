//! Host platform identity from `/etc/os-release`, falling back to
//! `/etc/redhat-release` on older RHEL-family hosts that predate os-release.

use opsbook_core::{OpsbookError, PlatformIdentity};
use std::fs;
use std::path::Path;

pub const OS_RELEASE_PATH: &str = "/etc/os-release";
pub const REDHAT_RELEASE_PATH: &str = "/etc/redhat-release";

pub fn detect_platform() -> Result<PlatformIdentity, OpsbookError> {
    detect_platform_from(Path::new(OS_RELEASE_PATH), Path::new(REDHAT_RELEASE_PATH))
}

pub fn detect_platform_from(
    os_release: &Path,
    redhat_release: &Path,
) -> Result<PlatformIdentity, OpsbookError> {
    if let Ok(content) = fs::read_to_string(os_release) {
        return parse_os_release(&content);
    }

    match fs::read_to_string(redhat_release) {
        Ok(content) => parse_redhat_release(&content),
        Err(_) => Err(OpsbookError::PlatformNotSupported(format!(
            "neither {} nor {} is readable",
            os_release.display(),
            redhat_release.display()
        ))),
    }
}

/// Read `ID` and `VERSION_ID`; values may be quoted.
pub fn parse_os_release(content: &str) -> Result<PlatformIdentity, OpsbookError> {
    let mut id = None;
    let mut version = None;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'');
        match key.trim() {
            "ID" => id = Some(value.to_string()),
            "VERSION_ID" => version = Some(value.to_string()),
            _ => {}
        }
    }

    let id = id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| OpsbookError::InvalidInput("os-release has no ID".to_string()))?;
    log::debug!("os-release: ID={} VERSION_ID={:?}", id, version);
    Ok(PlatformIdentity::new(id, version.unwrap_or_default()))
}

/// Parse lines like `CentOS release 6.5 (Final)` or
/// `Red Hat Enterprise Linux Server release 6.10 (Santiago)`.
pub fn parse_redhat_release(content: &str) -> Result<PlatformIdentity, OpsbookError> {
    let line = content.lines().next().unwrap_or("").trim();
    let lower = line.to_ascii_lowercase();

    let platform = if lower.starts_with("centos") {
        "centos"
    } else if lower.starts_with("red hat") {
        "redhat"
    } else if lower.starts_with("scientific") {
        "scientific"
    } else {
        return Err(OpsbookError::InvalidInput(format!(
            "unrecognised redhat-release: {}",
            line
        )));
    };

    let version = line
        .split_whitespace()
        .skip_while(|word| !word.eq_ignore_ascii_case("release"))
        .nth(1)
        .ok_or_else(|| OpsbookError::InvalidInput(format!("no release in: {}", line)))?;

    Ok(PlatformIdentity::new(platform, version))
}
