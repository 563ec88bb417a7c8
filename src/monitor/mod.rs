use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};

use crate::{command::ClusterCtl, context::AgentContext, parser};

/// `local_role` value of the instance that accepts writes.
pub const PRIMARY_ROLE: &str = "Primary";

/// Emitted once per transition of the local node into the primary role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryTransition {
    pub previous_role: String,
}

/// Remembers the last observed role and reports non-primary → primary edges.
#[derive(Debug, Default, Clone)]
pub struct RoleTracker {
    current_role: String,
}

impl RoleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_role(&self) -> &str {
        &self.current_role
    }

    /// Records `role`; returns the transition if the node just became primary.
    ///
    /// The tracker starts with an empty role, so a node that is already primary
    /// when the agent starts produces one transition on the first observation.
    pub fn observe(&mut self, role: &str) -> Option<PrimaryTransition> {
        if role == self.current_role {
            return None;
        }
        let previous_role = std::mem::replace(&mut self.current_role, role.to_string());
        log::info!(
            "Local role changed from '{}' to '{}'",
            previous_role,
            self.current_role
        );
        (role == PRIMARY_ROLE).then_some(PrimaryTransition { previous_role })
    }
}

/// Polls `gs_ctl query` for the local role.
pub struct RoleMonitor {
    ctl: ClusterCtl,
    data_path: String,
    interval: Duration,
    tracker: RoleTracker,
}

impl RoleMonitor {
    pub fn new(ctx: &AgentContext, ctl: ClusterCtl) -> Self {
        Self {
            ctl,
            data_path: ctx.identity.data_path.clone(),
            interval: ctx.settings.poll_interval,
            tracker: RoleTracker::new(),
        }
    }

    pub fn tracker(&self) -> &RoleTracker {
        &self.tracker
    }

    /// One query of the local role. A failed query or output without a role
    /// leaves the tracker untouched.
    pub async fn poll_once(&mut self) -> Option<PrimaryTransition> {
        let output = match self.ctl.local_query(&self.data_path).await {
            Ok(res) => match res.into_output() {
                Ok(output) => output,
                Err(e) => {
                    log::warn!("Failed to query local role: {}", e);
                    return None;
                }
            },
            Err(e) => {
                log::error!("Failed to query local role: {}", e);
                return None;
            }
        };

        let Some(role) = parser::parse_local_role(&output) else {
            log::warn!("No local_role in gs_ctl query output");
            return None;
        };
        self.tracker.observe(&role)
    }

    /// Polls until `shutdown` flips to true or the event receiver goes away.
    pub async fn run(
        mut self,
        events: mpsc::UnboundedSender<PrimaryTransition>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("Role monitor started, polling every {:?}", self.interval);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Some(event) = self.poll_once().await {
                        log::info!("Local node became primary (was '{}')", event.previous_role);
                        if events.send(event).is_err() {
                            log::warn!("Dispatcher is gone, stopping role monitor");
                            break;
                        }
                    }
                }
            }
        }
        log::info!("Role monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_on_edges_into_primary() {
        let mut tracker = RoleTracker::new();
        let roles = ["Standby", "Standby", "Primary", "Primary", "Standby", "Primary"];
        let emitted: Vec<usize> = roles
            .iter()
            .enumerate()
            .filter_map(|(i, role)| tracker.observe(role).map(|_| i + 1))
            .collect();
        assert_eq!(emitted, vec![3, 6]);
        assert_eq!(tracker.current_role(), "Primary");
    }

    #[test]
    fn already_primary_at_start_emits_once() {
        let mut tracker = RoleTracker::new();
        assert_eq!(
            tracker.observe("Primary"),
            Some(PrimaryTransition {
                previous_role: String::new()
            })
        );
        assert_eq!(tracker.observe("Primary"), None);
    }

    #[test]
    fn pending_and_unknown_roles_are_not_primary() {
        let mut tracker = RoleTracker::new();
        assert!(tracker.observe("Pending").is_none());
        assert!(tracker.observe("Unknown").is_none());
        let event = tracker.observe("Primary").unwrap();
        assert_eq!(event.previous_role, "Unknown");
    }
}
