pub mod device;
pub mod error;
pub mod format;
pub mod mount;
pub mod platform;
pub mod provision;
pub mod registry;
pub mod volume;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use device::{resolve_device, DeviceInspector};
pub use error::OpsbookError;
pub use format::VolumeFormatter;
pub use mount::{escape_field, unescape_field, MountEntry, MountProvider, DEFAULT_MOUNT_MODE};
pub use platform::{supports_filesystem, PlatformFamily, PlatformIdentity, GATED_FILESYSTEM};
pub use provision::{
    ProvisionConfig, ProvisionReport, Provisioner, Stage, VolumeAction, VolumeFailure,
    VolumeReport, VolumeStatus,
};
pub use registry::{FilesystemRegistry, RegistryChange};
pub use volume::{DeviceState, VolumeSpec};
