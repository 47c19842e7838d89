/// Lookups against a full attribute document as the agent writes it.

#[cfg(test)]
mod lookup_tests {
    use opsbook_inventory::{AgentAttributes, ClusterRecord, InventorySnapshot};
    use serde_json::json;
    use std::io::Write;

    const STACK: &str = include_str!("fixtures/stack.json");
    const OWN_ID: &str = "e0973c34-9f8c-42dd-af3f-44dc7cc03803";

    fn snapshot() -> InventorySnapshot {
        AgentAttributes::from_json(STACK).unwrap().inventory().unwrap()
    }

    #[test]
    fn test_own_instance_id() {
        assert_eq!(snapshot().find_own_instance_id(), OWN_ID);
    }

    #[test]
    fn test_find_instance() {
        let snapshot = snapshot();
        let instance = snapshot.find_instance().unwrap();
        assert_eq!(instance.instance_id, OWN_ID);
        assert_eq!(instance.hostname.as_deref(), Some("custom76e7569c118c1"));
        assert_eq!(instance.extra["root_device_type"], "instance-store");
    }

    #[test]
    fn test_find_layer_ids() {
        assert_eq!(
            snapshot().find_layer_ids(),
            vec!["72e98d37-f3bc-40a9-b094-9242575e2efa".to_string()]
        );
    }

    #[test]
    fn test_find_layers() {
        let snapshot = snapshot();
        let layers = snapshot.find_layers();
        let ids: Vec<_> = layers.iter().map(|l| l.layer_id.as_str()).collect();
        let names: Vec<_> = layers.iter().filter_map(|l| l.name.as_deref()).collect();
        assert_eq!(ids, vec!["72e98d37-f3bc-40a9-b094-9242575e2efa"]);
        assert_eq!(names, vec!["2015-09-10 13:57:05 +0200 3cd5"]);
    }

    #[test]
    fn test_find_ecs_cluster() {
        let snapshot = snapshot();
        let cluster = snapshot
            .find_ecs_cluster("arn:aws:ecs:us-east-1:661258169979:cluster/local")
            .unwrap();
        assert_eq!(
            serde_json::to_value(cluster).unwrap(),
            json!({
                "ecs_cluster_arn": "arn:aws:ecs:us-east-1:661258169979:cluster/local",
                "ecs_cluster_name": "local"
            })
        );
        assert_eq!(
            cluster,
            &ClusterRecord {
                ecs_cluster_arn: "arn:aws:ecs:us-east-1:661258169979:cluster/local".to_string(),
                ecs_cluster_name: Some("local".to_string()),
                ..ClusterRecord::default()
            }
        );
    }

    #[test]
    fn test_volumes_come_from_the_same_document() {
        let attributes = AgentAttributes::from_json(STACK).unwrap();
        assert_eq!(attributes.volumes().len(), 1);
        assert_eq!(attributes.volumes()[0].name, "testimage");
    }

    fn agent_data(infrastructure_class: &str, with_ec2: bool) -> String {
        let mut node = json!({
            "aws_opsworks_agent": {
                "command": {"instance_id": "my-id"},
                "resources": {
                    "instances": [
                        {"instance_id": "my-id", "infrastructure_class": infrastructure_class}
                    ]
                }
            }
        });
        if with_ec2 {
            node["ec2"] = json!({"some": "data"});
        }
        node.to_string()
    }

    #[test]
    fn test_ec2_instance_is_not_on_premises() {
        let attributes = AgentAttributes::from_json(&agent_data("ec2", true)).unwrap();
        assert!(!attributes.inventory().unwrap().on_premises());
    }

    #[test]
    fn test_ec2_instance_imported_as_on_premises() {
        let attributes = AgentAttributes::from_json(&agent_data("on-premises", true)).unwrap();
        assert!(attributes.inventory().unwrap().on_premises());
    }

    #[test]
    fn test_on_premises_instance() {
        let attributes = AgentAttributes::from_json(&agent_data("on-premises", false)).unwrap();
        assert!(attributes.inventory().unwrap().on_premises());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(STACK.as_bytes()).unwrap();
        let attributes = AgentAttributes::from_path(file.path()).unwrap();
        assert_eq!(
            attributes.inventory().unwrap().find_own_instance_id(),
            OWN_ID
        );
    }
}
