use std::{
    collections::{HashMap, HashSet},
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use anyhow::Result;
use parking_lot::RwLock;

use crate::util;

/// Headers that may carry the real client address, checked in this order.
pub const CLIENT_IP_HEADERS: [&str; 11] = [
    "X-Forwarded-For",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "HTTP_X_FORWARDED_FOR",
    "HTTP_X_FORWARDED",
    "HTTP_X_CLUSTER_CLIENT_IP",
    "HTTP_CLIENT_IP",
    "HTTP_FORWARDED_FOR",
    "HTTP_FORWARDED",
    "HTTP_VIA",
    "REMOTE_ADDR",
];

/// Client address as seen by the allowlist and the subscriber registry.
///
/// `headers` must have lowercase names. Loopback callers are reported under
/// this host's outbound address so that local tools can be allowlisted by it.
pub fn client_ip(headers: &HashMap<String, String>, peer: SocketAddr) -> String {
    let forwarded = CLIENT_IP_HEADERS.iter().find_map(|name| {
        let value = headers.get(&name.to_ascii_lowercase())?.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
            return None;
        }
        let first = value.split(',').next()?.trim();
        (!first.is_empty()).then(|| first.to_string())
    });
    let ip = forwarded.unwrap_or_else(|| peer.ip().to_string());

    let loopback = ip.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback());
    if !loopback {
        return ip;
    }
    util::primary_local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "localhost".to_string())
}

#[derive(Debug, Default)]
struct GateState {
    loaded_from: Option<SystemTime>,
    allowed: Option<Arc<HashSet<String>>>,
}

/// IP allowlist backed by a file that is re-read whenever its mtime moves.
///
/// Without a configured file every client is let in. With one, a missing or
/// unreadable file shuts everybody out until it is readable again.
#[derive(Debug, Default)]
pub struct AccessGate {
    path: Option<PathBuf>,
    state: RwLock<GateState>,
}

impl AccessGate {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            state: RwLock::new(GateState::default()),
        }
    }

    /// Gate that lets every client through.
    pub fn open() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_allowed(&self, ip: &str) -> bool {
        if self.path.is_none() {
            return true;
        }
        self.refresh();
        let allowed = self.state.read().allowed.clone();
        allowed.is_some_and(|allowed| allowed.contains(ip))
    }

    /// Re-reads the file when it changed since the last successful load.
    /// Returns the number of allowed addresses, `None` when nothing is loaded.
    pub fn refresh(&self) -> Option<usize> {
        let path = self.path.as_deref()?;

        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                let mut state = self.state.write();
                if state.allowed.is_some() {
                    log::error!("Allowlist {} is unavailable: {}", path.display(), e);
                }
                *state = GateState::default();
                return None;
            }
        };

        let stale = self
            .state
            .read()
            .loaded_from
            .is_none_or(|loaded| modified > loaded);
        if stale {
            match load_allowlist(path) {
                Ok(allowed) => {
                    log::info!(
                        "Loaded {} allowed addresses from {}",
                        allowed.len(),
                        path.display()
                    );
                    let mut state = self.state.write();
                    state.allowed = Some(Arc::new(allowed));
                    state.loaded_from = Some(modified);
                }
                Err(e) => {
                    log::error!("Failed to read allowlist {}: {}", path.display(), e);
                    *self.state.write() = GateState::default();
                }
            }
        }
        self.state.read().allowed.as_ref().map(|allowed| allowed.len())
    }
}

fn load_allowlist(path: &Path) -> Result<HashSet<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
