//! Field extraction over `cm_ctl` / `gs_ctl` text output.
//!
//! The tools print loosely aligned `name : value` lines. Their layout is a
//! contract of the external tooling; everything that depends on it lives here
//! and is pinned by the fixtures under `tests/fixtures/`.

mod identity;
mod status;

use regex::Regex;

pub use identity::{IdentityError, parse_identity};
pub use status::{parse_cluster_status, parse_local_role, parse_node_status};

/// First capture group of `re` in `text`, trimmed. Blank values count as absent.
fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}
