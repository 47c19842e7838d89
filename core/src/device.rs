use crate::DeviceState;
use std::path::{Path, PathBuf};

#[async_trait::async_trait]
pub trait DeviceInspector: Send + Sync {
    /// Whether `path` is a block device node.
    async fn is_block_device(&self, path: &Path) -> bool;

    /// Probe `device` for an existing filesystem signature. Never mutates the device.
    async fn inspect(&self, device: &Path) -> DeviceState;
}

/// Resolve the name the agent reports to the node the kernel created.
///
/// Xen guests expose `/dev/sdX` as `/dev/xvdX`. The reported path wins when
/// it exists; otherwise the `xvd` alias is tried. With neither present the
/// reported path is returned unchanged.
pub async fn resolve_device(inspector: &dyn DeviceInspector, device: &Path) -> PathBuf {
    if inspector.is_block_device(device).await {
        return device.to_path_buf();
    }

    if let Some(alias) = xen_alias(device) {
        if inspector.is_block_device(&alias).await {
            tracing::debug!(
                "Resolved {} to {}",
                device.display(),
                alias.display()
            );
            return alias;
        }
    }

    device.to_path_buf()
}

fn xen_alias(device: &Path) -> Option<PathBuf> {
    let name = device.to_str()?;
    let suffix = name.strip_prefix("/dev/sd")?;
    if suffix.is_empty() {
        return None;
    }
    Some(PathBuf::from(format!("/dev/xvd{}", suffix)))
}
