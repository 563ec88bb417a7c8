use cm_restapi::{
    domain::{identity::PeerAddr, status::NodeStatus},
    parser::{parse_cluster_status, parse_identity, parse_local_role, parse_node_status},
};

const QUERY_V: &str = include_str!("fixtures/cm_ctl_query_v.txt");
const QUERY_V_RESOURCES: &str = include_str!("fixtures/cm_ctl_query_v_resources.txt");
const VIEW_NATIVE: &str = include_str!("fixtures/cm_ctl_view_native.txt");
const GS_CTL_QUERY: &str = include_str!("fixtures/gs_ctl_query.txt");

fn node(ip: &str, cms: &str, role: &str, state: &str) -> NodeStatus {
    NodeStatus {
        node_ip: Some(ip.to_string()),
        cm_server_state: Some(cms.to_string()),
        dn_role: Some(role.to_string()),
        dn_state: Some(state.to_string()),
    }
}

#[test]
fn three_node_cluster() {
    let status = parse_cluster_status(QUERY_V);
    assert_eq!(status.cluster_state.as_deref(), Some("Normal"));
    assert!(status.defined_resources.is_none());
    assert_eq!(
        status.nodes,
        vec![
            node("192.168.0.1", "Primary", "Standby", "Normal"),
            node("192.168.0.2", "Standby", "Primary", "Normal"),
            node("192.168.0.3", "Standby", "Standby", "Catchup"),
        ]
    );
}

#[test]
fn resource_section_does_not_shift_nodes() {
    let status = parse_cluster_status(QUERY_V_RESOURCES);
    assert_eq!(status.cluster_state.as_deref(), Some("Normal"));
    assert_eq!(status.nodes, parse_cluster_status(QUERY_V).nodes);

    let resources = status.defined_resources.expect("resources");
    let summary: Vec<(u32, &str, &str)> = resources
        .iter()
        .map(|r| (r.node_id, r.resource_name.as_str(), r.state.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, "vip_app", "OnLine"),
            (2, "vip_app", "OnLine"),
            (3, "vip_app", "OffLine"),
        ]
    );
}

#[test]
fn cluster_status_json_uses_wire_names() -> anyhow::Result<()> {
    let json = serde_json::to_value(parse_cluster_status(QUERY_V_RESOURCES))?;
    assert_eq!(json["clusterState"], "Normal");
    assert_eq!(json["nodesStatus"][1]["nodeIp"], "192.168.0.2");
    assert_eq!(json["nodesStatus"][1]["dnRole"], "Primary");
    assert_eq!(json["defResStatus"][2]["resName"], "vip_app");
    assert_eq!(json["defResStatus"][2]["nodeId"], 3);
    Ok(())
}

#[test]
fn single_node_query_reuses_block_parser() {
    let block = QUERY_V.split("node                      : 3").nth(1).unwrap();
    let status = parse_node_status(&format!("node : 3{block}")).unwrap();
    assert_eq!(status, node("192.168.0.3", "Standby", "Standby", "Catchup"));
    assert!(parse_node_status("").is_none());
}

#[test]
fn identity_from_static_config() {
    let identity = parse_identity(VIEW_NATIVE).unwrap();
    assert_eq!(identity.node_id, 2);
    assert_eq!(identity.data_path, "/opt/gauss/data/dn");
    assert_eq!(identity.master_info().as_deref(), Some("192.168.0.2:26000"));
    assert_eq!(
        identity.peers,
        vec![
            PeerAddr {
                ip: "192.168.0.1".to_string(),
                port: 26000
            },
            PeerAddr {
                ip: "192.168.0.3".to_string(),
                port: 26000
            },
        ]
    );
    assert_eq!(identity.standby_info(), "192.168.0.1:26000,192.168.0.3:26000");
}

#[test]
fn local_role_takes_first_occurrence() {
    assert_eq!(parse_local_role(GS_CTL_QUERY).as_deref(), Some("Standby"));
    let primary = GS_CTL_QUERY.replacen("Standby", "Primary", 1);
    assert_eq!(parse_local_role(&primary).as_deref(), Some("Primary"));
}
