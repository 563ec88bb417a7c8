use std::sync::LazyLock;

use regex::Regex;

use super::capture;
use crate::domain::status::{ClusterStatus, DefinedResourceStatus, NodeStatus};

const RESOURCE_PREAMBLE: &str = "Defined Resource State";

static BLOCK_RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-{70,}\s+").unwrap());
static HEADER_RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-+\s+").unwrap());
static CLUSTER_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)cluster_state[^:\n]*:[ \t]*(.*)$").unwrap());
static NODE_IP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)node_ip[^:\n]*:[ \t]*(.*)$").unwrap());
static CM_SERVER_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)type[^\n]*CMServer\s+instance_state[^:\n]*:[ \t]*(.*)$").unwrap()
});
static DATANODE_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)type[^\n]*Datanode\s+instance_state[^:\n]*:[ \t]*(.*)$").unwrap()
});
static HA_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)HA_state[^:\n]*:[ \t]*(.*)$").unwrap());
static LOCAL_ROLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)local_role[^:\n]*:[ \t]*(.*)$").unwrap());

/// Parses `cm_ctl query -v`.
///
/// Blocks are separated by long dashed rules: an optional defined-resource
/// block, the cluster block, then one block per node. Missing lines leave
/// the matching field empty instead of failing.
pub fn parse_cluster_status(text: &str) -> ClusterStatus {
    let blocks: Vec<&str> = BLOCK_RULE.split(text).collect();
    let mut status = ClusterStatus::default();

    let mut start = 0;
    if blocks.first().is_some_and(|b| b.contains(RESOURCE_PREAMBLE)) {
        start = 1;
        status.defined_resources = Some(parse_resources(blocks[0]));
    }

    if let Some(head) = blocks.get(start) {
        status.cluster_state = capture(&CLUSTER_STATE, head);
    }

    status.nodes = blocks
        .iter()
        .skip(start + 1)
        .filter(|block| !block.trim().is_empty())
        .map(|block| parse_node_block(block))
        .collect();

    status
}

/// Parses `cm_ctl query -v -n <id>`. Blank output means the node is unknown.
pub fn parse_node_status(text: &str) -> Option<NodeStatus> {
    if text.trim().is_empty() {
        return None;
    }
    Some(parse_node_block(text))
}

/// Extracts `local_role` from `gs_ctl query`.
pub fn parse_local_role(text: &str) -> Option<String> {
    capture(&LOCAL_ROLE, text)
}

fn parse_node_block(block: &str) -> NodeStatus {
    NodeStatus {
        node_ip: capture(&NODE_IP, block),
        cm_server_state: capture(&CM_SERVER_STATE, block),
        dn_role: capture(&DATANODE_STATE, block),
        dn_state: capture(&HA_STATE, block),
    }
}

// Rows below the block's own header rule: node, node_name, res_name, instance, state.
fn parse_resources(block: &str) -> Vec<DefinedResourceStatus> {
    let Some(rows) = HEADER_RULE.split(block).nth(1) else {
        return Vec::new();
    };

    rows.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let parsed = match (cols.first(), cols.get(2), cols.get(4)) {
                (Some(id), Some(name), Some(state)) => {
                    id.parse::<u32>().ok().map(|node_id| DefinedResourceStatus {
                        node_id,
                        resource_name: name.to_string(),
                        state: state.to_string(),
                    })
                }
                _ => None,
            };
            if parsed.is_none() {
                log::warn!("Skipping malformed resource state line: {:?}", line);
            }
            parsed
        })
        .collect()
}
