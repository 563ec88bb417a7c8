use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::capture;
use crate::domain::identity::{NodeIdentity, PeerAddr};

static NODE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bnode[ \t]*:[ \t]*(\d+)").unwrap());
static DATA_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"datanodeLocalDataPath[ \t]*:[ \t]*(.*)").unwrap());
static HOST_IP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"datanodeLocalHAIP[ \t]*1[ \t]*:[ \t]*(.*)").unwrap());
static PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"datanodePort[ \t]*:[ \t]*(.*)").unwrap());
static PEER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"datanodePeer\d+HAIP[ \t]*1[ \t]*:[ \t]*(\S+)[ \t]*\r?\n\s*datanodePeer\d+HAPort[ \t]*:[ \t]*(\S+)",
    )
    .unwrap()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("node id not found in static config")]
    MissingNodeId,
    #[error("invalid node id {0:?}")]
    InvalidNodeId(String),
    #[error("datanode data path not found in static config")]
    MissingDataPath,
}

/// Parses the `cm_ctl view -N` dump of the local node.
///
/// Peers advertise their HA port; the port applications connect to is the
/// one just below it, so each peer port is the HA port minus one.
pub fn parse_identity(text: &str) -> Result<NodeIdentity, IdentityError> {
    let raw_id = capture(&NODE_ID, text).ok_or(IdentityError::MissingNodeId)?;
    let node_id = raw_id
        .parse::<u32>()
        .map_err(|_| IdentityError::InvalidNodeId(raw_id.clone()))?;
    let data_path = capture(&DATA_PATH, text).ok_or(IdentityError::MissingDataPath)?;

    let host_ip = capture(&HOST_IP, text);
    let port = capture(&PORT, text).and_then(|p| match p.parse::<u16>() {
        Ok(port) => Some(port),
        Err(_) => {
            log::warn!("Ignoring unparsable datanode port {:?}", p);
            None
        }
    });

    let peers = PEER
        .captures_iter(text)
        .filter_map(|caps| {
            let ip = caps[1].to_string();
            let ha_port = &caps[2];
            match ha_port.parse::<u16>().ok().and_then(|p| p.checked_sub(1)) {
                Some(port) if port > 0 => Some(PeerAddr { ip, port }),
                _ => {
                    log::warn!("Skipping peer {} with invalid HA port {:?}", ip, ha_port);
                    None
                }
            }
        })
        .collect();

    Ok(NodeIdentity {
        node_id,
        data_path,
        host_ip,
        port,
        peers,
    })
}
