#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::LinuxDeviceInspector as PlatformDeviceInspector;

#[cfg(target_os = "linux")]
pub use linux::LinuxMountProvider as PlatformMountProvider;

#[cfg(target_os = "linux")]
pub use linux::MkfsFormatter as PlatformFormatter;

#[cfg(target_os = "linux")]
pub use linux::{detect_platform, is_root};
