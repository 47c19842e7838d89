//! Typed lookups over the inventory the agent reports about the stack:
//! which instance this node is, its layers, and the ECS clusters it knows.

pub mod attributes;
pub mod records;
pub mod snapshot;

pub use attributes::AgentAttributes;
pub use records::{ClusterRecord, InstanceRecord, LayerRecord, ON_PREMISES};
pub use snapshot::InventorySnapshot;
