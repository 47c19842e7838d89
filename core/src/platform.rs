//! Which operating systems can carry the target filesystem.
//!
//! The table is fixed at build time. Unknown platforms are never an error,
//! they are simply unsupported.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The filesystem the support table describes. Volume preparation is gated
/// on it whichever filesystem is actually written.
pub const GATED_FILESYSTEM: &str = "xfs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformFamily {
    Debian,
    Amazon,
    Rhel,
    Other(String),
}

impl PlatformFamily {
    /// Map a platform name (`ubuntu`, `centos`, an os-release `ID`, ...) onto its family.
    pub fn from_platform(platform: &str) -> Self {
        match platform.trim().to_ascii_lowercase().as_str() {
            "debian" | "ubuntu" | "linuxmint" | "raspbian" => PlatformFamily::Debian,
            "amazon" | "amzn" => PlatformFamily::Amazon,
            "rhel" | "redhat" | "centos" | "scientific" | "oracle" | "ol" | "rocky"
            | "almalinux" => PlatformFamily::Rhel,
            other => PlatformFamily::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformFamily::Debian => write!(f, "debian"),
            PlatformFamily::Amazon => write!(f, "amazon"),
            PlatformFamily::Rhel => write!(f, "rhel"),
            PlatformFamily::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Platform name and version as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformIdentity {
    pub platform: String,
    pub version: String,
}

impl PlatformIdentity {
    pub fn new(platform: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            version: version.into(),
        }
    }

    pub fn family(&self) -> PlatformFamily {
        PlatformFamily::from_platform(&self.platform)
    }

    pub fn supports_filesystem(&self) -> bool {
        supports_filesystem(&self.family(), &self.version)
    }
}

impl fmt::Display for PlatformIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform, self.version)
    }
}

/// Debian and Amazon always qualify; the RHEL family from major version 7 on.
pub fn supports_filesystem(family: &PlatformFamily, version: &str) -> bool {
    match family {
        PlatformFamily::Debian | PlatformFamily::Amazon => true,
        PlatformFamily::Rhel => major_version(version).map_or(false, |major| major >= 7),
        PlatformFamily::Other(_) => false,
    }
}

fn major_version(version: &str) -> Option<u32> {
    let digits: String = version
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
