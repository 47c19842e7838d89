pub mod device;
pub mod format;
pub mod mount;
pub mod os_release;

pub use device::LinuxDeviceInspector;
pub use format::MkfsFormatter;
pub use mount::LinuxMountProvider;
pub use os_release::detect_platform;

/// Formatting and mounting need root; probing usually does too.
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}
