//! The node attribute document written by the agent.
//!
//! ```json
//! {"aws_opsworks_agent": {
//!     "command": {"instance_id": "..."},
//!     "resources": {"volumes": [], "instances": [], "layers": [], "ecs_clusters": []}}}
//! ```
//!
//! Volumes are typed on load. The inventory lists are kept raw until
//! [`AgentAttributes::inventory`] asks for them, so a bad instance or layer
//! record never blocks volume preparation. Missing sections read as empty.

use crate::records::{null_as_empty, ClusterRecord, InstanceRecord, LayerRecord};
use crate::snapshot::InventorySnapshot;
use opsbook_core::{OpsbookError, VolumeSpec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentAttributes {
    #[serde(rename = "aws_opsworks_agent", default)]
    pub agent: AgentSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default)]
    pub command: CommandSection,
    #[serde(default)]
    pub resources: Resources,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSection {
    #[serde(default)]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resources {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub volumes: Vec<VolumeSpec>,
    #[serde(default)]
    pub instances: Value,
    #[serde(default)]
    pub layers: Value,
    #[serde(default)]
    pub ecs_clusters: Value,
}

fn section_len(section: &Value) -> usize {
    section.as_array().map_or(0, Vec::len)
}

fn records<T: DeserializeOwned>(section: &Value, name: &str) -> Result<Vec<T>, OpsbookError> {
    let records: Option<Vec<T>> = serde_json::from_value(section.clone())
        .map_err(|e| OpsbookError::InvalidInput(format!("resources.{}: {}", name, e)))?;
    Ok(records.unwrap_or_default())
}

impl AgentAttributes {
    pub fn from_json(json: &str) -> Result<Self, OpsbookError> {
        let attributes: Self = serde_json::from_str(json)?;
        tracing::debug!(
            "Loaded attributes: {} volume(s), {} instance(s), {} layer(s), {} cluster(s)",
            attributes.agent.resources.volumes.len(),
            section_len(&attributes.agent.resources.instances),
            section_len(&attributes.agent.resources.layers),
            section_len(&attributes.agent.resources.ecs_clusters)
        );
        Ok(attributes)
    }

    pub fn from_path(path: &Path) -> Result<Self, OpsbookError> {
        let json = fs::read_to_string(path).map_err(|e| {
            OpsbookError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn volumes(&self) -> &[VolumeSpec] {
        &self.agent.resources.volumes
    }

    /// Build the lookup snapshot. Fails when the command section has no
    /// instance id or an inventory record is malformed.
    pub fn inventory(&self) -> Result<InventorySnapshot, OpsbookError> {
        let own_instance_id = self
            .agent
            .command
            .instance_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                OpsbookError::InvalidInput(
                    "aws_opsworks_agent.command.instance_id is missing".to_string(),
                )
            })?;

        let resources = &self.agent.resources;
        let instances: Vec<InstanceRecord> = records(&resources.instances, "instances")?;
        let layers: Vec<LayerRecord> = records(&resources.layers, "layers")?;
        let ecs_clusters: Vec<ClusterRecord> = records(&resources.ecs_clusters, "ecs_clusters")?;
        Ok(InventorySnapshot {
            own_instance_id,
            instances,
            layers,
            ecs_clusters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_volumes_section() {
        let attributes = AgentAttributes::from_json(
            r#"{"aws_opsworks_agent": {"resources": {"volumes": [
                {"name": "testimage", "device": "/dev/sdf", "mount_point": "/asdf"},
                {"name": "scratch", "device": "/dev/sdg", "mount_point": null}
            ]}}}"#,
        )
        .unwrap();

        let volumes = attributes.volumes();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].device, PathBuf::from("/dev/sdf"));
        assert_eq!(volumes[0].mount_point(), Some(Path::new("/asdf")));
        assert_eq!(volumes[1].mount_point(), None);
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let attributes = AgentAttributes::from_json("{}").unwrap();
        assert!(attributes.volumes().is_empty());

        let attributes =
            AgentAttributes::from_json(r#"{"aws_opsworks_agent": {"resources": {"volumes": null}}}"#)
                .unwrap();
        assert!(attributes.volumes().is_empty());
    }

    #[test]
    fn test_inventory_requires_instance_id() {
        let attributes = AgentAttributes::from_json(r#"{"aws_opsworks_agent": {}}"#).unwrap();
        assert!(matches!(
            attributes.inventory(),
            Err(OpsbookError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_bad_inventory_record_does_not_block_volumes() {
        let attributes = AgentAttributes::from_json(
            r#"{"aws_opsworks_agent": {
                "command": {"instance_id": "i-1"},
                "resources": {
                    "volumes": [{"name": "testimage", "device": "/dev/sdf", "mount_point": "/asdf"}],
                    "instances": [{"hostname": "no-id"}],
                    "layers": null
                }}}"#,
        )
        .unwrap();

        assert_eq!(attributes.volumes().len(), 1);
        match attributes.inventory() {
            Err(OpsbookError::InvalidInput(message)) => {
                assert!(message.starts_with("resources.instances:"))
            }
            other => panic!("expected an inventory error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_volume_without_device_is_rejected() {
        let result = AgentAttributes::from_json(
            r#"{"aws_opsworks_agent": {"resources": {"volumes": [{"name": "x"}]}}}"#,
        );
        assert!(matches!(result, Err(OpsbookError::SerializationError(_))));
    }
}
