use serde::{Deserialize, Serialize};

/// Whole-cluster view built from `cm_ctl query -v`. Never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(rename = "clusterState")]
    pub cluster_state: Option<String>,
    #[serde(rename = "nodesStatus")]
    pub nodes: Vec<NodeStatus>,
    #[serde(rename = "defResStatus")]
    pub defined_resources: Option<Vec<DefinedResourceStatus>>,
}

/// Any field is `None` when the source text lacks its line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub node_ip: Option<String>,
    pub cm_server_state: Option<String>,
    pub dn_role: Option<String>,
    pub dn_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedResourceStatus {
    #[serde(rename = "nodeId")]
    pub node_id: u32,
    #[serde(rename = "resName")]
    pub resource_name: String,
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_wire_names_and_keeps_nulls() {
        let status = ClusterStatus {
            cluster_state: Some("Normal".to_string()),
            nodes: vec![NodeStatus {
                node_ip: Some("10.0.0.1".to_string()),
                cm_server_state: Some("Primary".to_string()),
                dn_role: Some("Primary".to_string()),
                dn_state: None,
            }],
            defined_resources: None,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "clusterState": "Normal",
                "nodesStatus": [{
                    "nodeIp": "10.0.0.1",
                    "cmServerState": "Primary",
                    "dnRole": "Primary",
                    "dnState": null
                }],
                "defResStatus": null
            })
        );
    }

    #[test]
    fn resource_status_json() {
        let res = DefinedResourceStatus {
            node_id: 2,
            resource_name: "app1".to_string(),
            state: "OnLine".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            serde_json::json!({"nodeId": 2, "resName": "app1", "state": "OnLine"})
        );
    }
}
