use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `infrastructure_class` value of instances registered from outside EC2.
pub const ON_PREMISES: &str = "on-premises";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub layer_ids: Vec<String>,
    #[serde(default)]
    pub infrastructure_class: Option<String>,
    #[serde(default)]
    pub ec2_instance_id: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Everything else the agent reports, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstanceRecord {
    pub fn is_on_premises(&self) -> bool {
        self.infrastructure_class.as_deref() == Some(ON_PREMISES)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub layer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub shortname: Option<String>,
    #[serde(rename = "type", default)]
    pub layer_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub ecs_cluster_arn: String,
    #[serde(default)]
    pub ecs_cluster_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
