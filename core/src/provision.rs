//! Per-volume preparation: inspect, format if blank, register the type, mount.
//!
//! Every volume runs through the same stages in configuration order. A
//! failure stops that volume at the failing stage and is recorded in the
//! report; the remaining volumes are still processed.

use crate::device::resolve_device;
use crate::registry::{FilesystemRegistry, RegistryChange, DEFAULT_REGISTRY_PATH, LEGACY_SENTINEL};
use crate::{
    DeviceInspector, MountEntry, MountProvider, OpsbookError, PlatformIdentity, VolumeFormatter,
    VolumeSpec, DEFAULT_MOUNT_MODE, GATED_FILESYSTEM,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_FILESYSTEM: &str = "xfs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Filesystem written onto blank volumes.
    pub filesystem: String,
    pub registry_path: PathBuf,
    pub sentinel: String,
    pub mount_mode: u32,
    /// Inspect and report, but change nothing.
    pub dry_run: bool,
    /// Treat a device whose probe failed as blank.
    pub format_on_probe_failure: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            filesystem: DEFAULT_FILESYSTEM.to_string(),
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            sentinel: LEGACY_SENTINEL.to_string(),
            mount_mode: DEFAULT_MOUNT_MODE,
            dry_run: false,
            format_on_probe_failure: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inspect,
    Format,
    Register,
    Mount,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Inspect => "inspect",
            Stage::Format => "format",
            Stage::Register => "register",
            Stage::Mount => "mount",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VolumeAction {
    Formatted { fs_type: String },
    KeptFilesystem { fs_type: String },
    Registered { index: usize },
    AlreadyRegistered,
    MountPointCreated { path: PathBuf },
    MountEnabled { entry: MountEntry },
    Mounted { entry: MountEntry },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeFailure {
    pub device: PathBuf,
    pub stage: Stage,
    pub message: String,
}

impl VolumeFailure {
    fn new(device: &Path, stage: Stage, error: impl fmt::Display) -> Self {
        Self {
            device: device.to_path_buf(),
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for VolumeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} stage failed: {}",
            self.device.display(),
            self.stage,
            self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VolumeStatus {
    Prepared,
    Skipped { reason: String },
    Failed(VolumeFailure),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeReport {
    pub name: String,
    pub device: PathBuf,
    pub resolved_device: Option<PathBuf>,
    pub status: VolumeStatus,
    pub actions: Vec<VolumeAction>,
}

impl VolumeReport {
    fn new(volume: &VolumeSpec) -> Self {
        Self {
            name: volume.name.clone(),
            device: volume.device.clone(),
            resolved_device: None,
            status: VolumeStatus::Prepared,
            actions: Vec::new(),
        }
    }

    pub fn failure(&self) -> Option<&VolumeFailure> {
        match &self.status {
            VolumeStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn formatted(&self) -> bool {
        self.actions
            .iter()
            .any(|action| matches!(action, VolumeAction::Formatted { .. }))
    }

    pub fn mounted(&self) -> bool {
        self.actions
            .iter()
            .any(|action| matches!(action, VolumeAction::Mounted { .. }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub platform: PlatformIdentity,
    pub filesystem: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub volumes: Vec<VolumeReport>,
}

impl ProvisionReport {
    pub fn failures(&self) -> Vec<&VolumeFailure> {
        self.volumes.iter().filter_map(VolumeReport::failure).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }
}

pub struct Provisioner {
    inspector: Arc<dyn DeviceInspector>,
    formatter: Arc<dyn VolumeFormatter>,
    mounter: Arc<dyn MountProvider>,
    registry: FilesystemRegistry,
    config: ProvisionConfig,
}

impl Provisioner {
    pub fn new(
        inspector: Arc<dyn DeviceInspector>,
        formatter: Arc<dyn VolumeFormatter>,
        mounter: Arc<dyn MountProvider>,
        config: ProvisionConfig,
    ) -> Self {
        let registry =
            FilesystemRegistry::new(&config.registry_path).with_sentinel(config.sentinel.clone());
        Self {
            inspector,
            formatter,
            mounter,
            registry,
            config,
        }
    }

    pub async fn provision(
        &self,
        platform: &PlatformIdentity,
        volumes: &[VolumeSpec],
    ) -> ProvisionReport {
        let started_at = Utc::now();

        if !platform.supports_filesystem() {
            tracing::info!(
                "{} does not support {}, ignoring {} volume(s)",
                platform,
                GATED_FILESYSTEM,
                volumes.len()
            );
        }

        let mut reports = Vec::with_capacity(volumes.len());
        for volume in volumes {
            reports.push(self.provision_volume(platform, volume).await);
        }

        ProvisionReport {
            platform: platform.clone(),
            filesystem: self.config.filesystem.clone(),
            dry_run: self.config.dry_run,
            started_at,
            finished_at: Utc::now(),
            volumes: reports,
        }
    }

    pub async fn provision_volume(
        &self,
        platform: &PlatformIdentity,
        volume: &VolumeSpec,
    ) -> VolumeReport {
        let mut report = VolumeReport::new(volume);

        if !platform.supports_filesystem() {
            report.status = VolumeStatus::Skipped {
                reason: format!("{} not supported on {}", GATED_FILESYSTEM, platform),
            };
            return report;
        }

        match self.prepare(volume, &mut report).await {
            Ok(()) => {
                tracing::info!("Volume {} ({}) prepared", volume.name, volume.device.display());
            }
            Err(failure) => {
                tracing::error!("Volume {}: {}", volume.name, failure);
                report.status = VolumeStatus::Failed(failure);
            }
        }
        report
    }

    async fn prepare(
        &self,
        volume: &VolumeSpec,
        report: &mut VolumeReport,
    ) -> Result<(), VolumeFailure> {
        let fs_type = self.config.filesystem.as_str();
        let device = resolve_device(self.inspector.as_ref(), &volume.device).await;
        report.resolved_device = Some(device.clone());

        // Inspect
        let state = self.inspector.inspect(&device).await;
        if !state.exists {
            return Err(VolumeFailure::new(
                &device,
                Stage::Inspect,
                OpsbookError::DeviceNotFound(format!("{} is not a block device", device.display())),
            ));
        }
        if let Some(reason) = &state.probe_error {
            if !self.config.format_on_probe_failure {
                return Err(VolumeFailure::new(
                    &device,
                    Stage::Inspect,
                    OpsbookError::ProbeFailed(format!("{}; refusing to format", reason)),
                ));
            }
            tracing::warn!(
                "Probe of {} failed ({}), treating it as blank",
                device.display(),
                reason
            );
        }

        // Format
        match &state.fs_type {
            Some(existing) => {
                tracing::info!(
                    "{} already carries {}, not formatting",
                    device.display(),
                    existing
                );
                report.actions.push(VolumeAction::KeptFilesystem {
                    fs_type: existing.clone(),
                });
            }
            None => {
                if !self.config.dry_run {
                    self.format(&device, fs_type)
                        .await
                        .map_err(|e| VolumeFailure::new(&device, Stage::Format, e))?;
                }
                report.actions.push(VolumeAction::Formatted {
                    fs_type: fs_type.to_string(),
                });
            }
        }

        // Register
        let change = if self.config.dry_run {
            self.registry.plan(fs_type)
        } else {
            self.registry.ensure_registered(fs_type)
        };
        let change = change.map_err(|e| VolumeFailure::new(&device, Stage::Register, e))?;
        match change {
            RegistryChange::Inserted { index } => {
                report.actions.push(VolumeAction::Registered { index })
            }
            RegistryChange::AlreadyPresent => report.actions.push(VolumeAction::AlreadyRegistered),
            RegistryChange::Missing => {}
        }

        // Mount
        let Some(mount_point) = volume.mount_point() else {
            tracing::debug!("No mount point for {}, leaving it unmounted", device.display());
            return Ok(());
        };
        let entry = MountEntry::volume(&device, mount_point);
        let mount_failed = |e: OpsbookError| VolumeFailure::new(&device, Stage::Mount, e);
        // Each step is recorded as soon as it lands, so a failed volume still
        // reports what was changed on the host.
        if !self.config.dry_run {
            self.mounter
                .create_mount_point(mount_point, self.config.mount_mode)
                .await
                .map_err(mount_failed)?;
        }
        report.actions.push(VolumeAction::MountPointCreated {
            path: mount_point.to_path_buf(),
        });

        if !self.config.dry_run {
            self.mounter.enable(&entry).await.map_err(mount_failed)?;
        }
        report.actions.push(VolumeAction::MountEnabled {
            entry: entry.clone(),
        });

        if !self.config.dry_run {
            self.mounter.mount(&entry).await.map_err(mount_failed)?;
        }
        report.actions.push(VolumeAction::Mounted { entry });

        Ok(())
    }

    async fn format(&self, device: &Path, fs_type: &str) -> Result<(), OpsbookError> {
        self.formatter.check_available(fs_type).await?;
        tracing::info!("Formatting {} as {}", device.display(), fs_type);
        self.formatter.format(device, fs_type).await
    }
}
