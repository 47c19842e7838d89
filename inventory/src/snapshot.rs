use crate::records::{ClusterRecord, InstanceRecord, LayerRecord};
use serde::{Deserialize, Serialize};

/// Read-only view of the stack as reported by the agent for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub own_instance_id: String,
    pub instances: Vec<InstanceRecord>,
    pub layers: Vec<LayerRecord>,
    pub ecs_clusters: Vec<ClusterRecord>,
}

impl InventorySnapshot {
    pub fn new(own_instance_id: impl Into<String>) -> Self {
        Self {
            own_instance_id: own_instance_id.into(),
            ..Self::default()
        }
    }

    pub fn find_own_instance_id(&self) -> &str {
        &self.own_instance_id
    }

    pub fn find_instance(&self) -> Option<&InstanceRecord> {
        let found = self
            .instances
            .iter()
            .find(|instance| instance.instance_id == self.own_instance_id);
        if found.is_none() {
            tracing::debug!(
                "Instance {} is not in the reported inventory",
                self.own_instance_id
            );
        }
        found
    }

    /// Layer IDs of this instance; empty when the instance is not listed.
    pub fn find_layer_ids(&self) -> Vec<String> {
        self.find_instance()
            .map(|instance| instance.layer_ids.clone())
            .unwrap_or_default()
    }

    /// Layers this instance belongs to, in the order of its layer-id list.
    /// IDs without a matching layer record are dropped.
    pub fn find_layers(&self) -> Vec<&LayerRecord> {
        self.find_layer_ids()
            .iter()
            .filter_map(|id| self.layers.iter().find(|layer| &layer.layer_id == id))
            .collect()
    }

    pub fn find_ecs_cluster(&self, arn: &str) -> Option<&ClusterRecord> {
        self.ecs_clusters
            .iter()
            .find(|cluster| cluster.ecs_cluster_arn == arn)
    }

    pub fn on_premises(&self) -> bool {
        self.find_instance()
            .map_or(false, InstanceRecord::is_on_premises)
    }
}
