use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use opsbook_core::{
    PlatformIdentity, ProvisionConfig, ProvisionReport, Provisioner, VolumeAction, VolumeStatus,
    GATED_FILESYSTEM,
};
use opsbook_inventory::AgentAttributes;
use opsbook_platform::{PlatformDeviceInspector, PlatformFormatter, PlatformMountProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "opsbook")]
#[command(about = "Prepare attached volumes and query the stack inventory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct PlatformArgs {
    /// Platform name (ubuntu, amazon, redhat, centos, ...); detected when omitted
    #[arg(long, requires = "platform_version")]
    platform: Option<String>,
    /// Platform version, e.g. 14.04 or 7.0
    #[arg(long, requires = "platform")]
    platform_version: Option<String>,
}

impl PlatformArgs {
    fn resolve(&self) -> anyhow::Result<PlatformIdentity> {
        match (&self.platform, &self.platform_version) {
            (Some(platform), Some(version)) => Ok(PlatformIdentity::new(platform, version)),
            _ => opsbook_platform::detect_platform().context("failed to detect the host platform"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Format, register and mount the volumes listed in the attribute document
    PrepareVolumes {
        /// Agent attribute document (JSON)
        #[arg(short, long)]
        attributes: PathBuf,
        #[command(flatten)]
        platform: PlatformArgs,
        /// Filesystem written onto blank volumes; platforms without xfs support are skipped regardless
        #[arg(short, long, default_value = "xfs")]
        filesystem: String,
        /// Filesystem-types registry
        #[arg(long, default_value = "/etc/filesystems")]
        registry: PathBuf,
        /// Report what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Format devices whose probe failed instead of refusing
        #[arg(long)]
        format_on_probe_failure: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Query the stack inventory from the attribute document
    Inventory {
        /// Agent attribute document (JSON)
        #[arg(short, long)]
        attributes: PathBuf,
        #[command(subcommand)]
        query: InventoryQuery,
    },
    /// Show the detected platform and whether it supports xfs
    Platform {
        #[command(flatten)]
        platform: PlatformArgs,
    },
}

#[derive(Subcommand)]
enum InventoryQuery {
    /// ID of this instance
    InstanceId,
    /// Record of this instance
    Instance,
    /// Layer IDs this instance belongs to
    LayerIds,
    /// Layer records this instance belongs to
    Layers,
    /// ECS cluster with the given ARN
    EcsCluster { arn: String },
    /// Whether this instance is registered as on-premises
    OnPremises,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::PrepareVolumes {
            attributes,
            platform,
            filesystem,
            registry,
            dry_run,
            format_on_probe_failure,
            json,
        } => {
            let attributes = AgentAttributes::from_path(&attributes)?;
            let platform = platform.resolve()?;
            tracing::info!("Platform {} ({})", platform, platform.family());

            if !dry_run && !opsbook_platform::is_root() {
                tracing::warn!("Not running as root; formatting and mounting will likely fail");
            }

            let config = ProvisionConfig {
                filesystem,
                registry_path: registry,
                dry_run,
                format_on_probe_failure,
                ..ProvisionConfig::default()
            };
            let provisioner = Provisioner::new(
                Arc::new(PlatformDeviceInspector::new()),
                Arc::new(PlatformFormatter::new()),
                Arc::new(PlatformMountProvider::new()),
                config,
            );

            let report = provisioner.provision(&platform, attributes.volumes()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            let failures = report.failures();
            if !failures.is_empty() {
                bail!("{} of {} volume(s) failed", failures.len(), report.volumes.len());
            }
        }
        Commands::Inventory { attributes, query } => {
            let snapshot = AgentAttributes::from_path(&attributes)?.inventory()?;
            let value = match query {
                InventoryQuery::InstanceId => serde_json::json!(snapshot.find_own_instance_id()),
                InventoryQuery::Instance => serde_json::to_value(snapshot.find_instance())?,
                InventoryQuery::LayerIds => serde_json::to_value(snapshot.find_layer_ids())?,
                InventoryQuery::Layers => serde_json::to_value(snapshot.find_layers())?,
                InventoryQuery::EcsCluster { arn } => {
                    serde_json::to_value(snapshot.find_ecs_cluster(&arn))?
                }
                InventoryQuery::OnPremises => serde_json::json!(snapshot.on_premises()),
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Platform { platform } => {
            let platform = platform.resolve()?;
            println!("Platform: {}", platform);
            println!("  Family: {}", platform.family());
            println!(
                "  Supports {}: {}",
                GATED_FILESYSTEM,
                if platform.supports_filesystem() { "Yes" } else { "No" }
            );
        }
    }

    Ok(())
}

fn print_report(report: &ProvisionReport) {
    if report.volumes.is_empty() {
        println!("No volumes configured.");
        return;
    }
    if report.dry_run {
        println!("DRY RUN: nothing was changed.\n");
    }

    for volume in &report.volumes {
        println!("Volume: {}", volume.name);
        println!("  Device: {}", volume.device.display());
        if let Some(resolved) = &volume.resolved_device {
            if resolved != &volume.device {
                println!("  Resolved to: {}", resolved.display());
            }
        }
        match &volume.status {
            VolumeStatus::Prepared => println!("  Status: prepared"),
            VolumeStatus::Skipped { reason } => println!("  Status: skipped ({})", reason),
            VolumeStatus::Failed(failure) => println!("  Status: FAILED ({})", failure),
        }
        for action in &volume.actions {
            println!("  - {}", describe(action));
        }
        println!();
    }
}

fn describe(action: &VolumeAction) -> String {
    match action {
        VolumeAction::Formatted { fs_type } => format!("formatted as {}", fs_type),
        VolumeAction::KeptFilesystem { fs_type } => format!("kept existing {} filesystem", fs_type),
        VolumeAction::Registered { index } => format!("registered at line {}", index + 1),
        VolumeAction::AlreadyRegistered => "already registered".to_string(),
        VolumeAction::MountPointCreated { path } => format!("created {}", path.display()),
        VolumeAction::MountEnabled { entry } => format!("enabled: {}", entry.to_fstab_line()),
        VolumeAction::Mounted { entry } => format!("mounted at {}", entry.mount_point.display()),
    }
}
