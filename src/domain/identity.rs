use std::fmt;

use serde::{Deserialize, Serialize};

/// Static identity of the local node, read once from `cm_ctl view -N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_id: u32,
    pub data_path: String,
    pub host_ip: Option<String>,
    pub port: Option<u16>,
    pub peers: Vec<PeerAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddr {
    pub ip: String,
    pub port: u16,
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl NodeIdentity {
    /// `ip:port` this node serves on once it is primary.
    pub fn master_info(&self) -> Option<String> {
        match (&self.host_ip, self.port) {
            (Some(ip), Some(port)) => Some(format!("{ip}:{port}")),
            _ => None,
        }
    }

    /// Comma-joined `ip:port` list of the peers, which become standbys.
    pub fn standby_info(&self) -> String {
        self.peers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
