use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    sync::{Semaphore, mpsc, watch},
    task::JoinSet,
};

use crate::{context::AgentContext, monitor::PrimaryTransition, registry::SubscriberRegistry};

pub const MASTER_INFO_PATH: &str = "MasterInfo";
pub const STANDBY_INFO_PATH: &str = "StandbyInfo";

/// Result of one PUT to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered(u16),
    Rejected(u16),
    Failed(String),
}

impl PushOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PushOutcome::Delivered(_))
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// `client_ip[/app]`
    pub subscriber: String,
    pub url: String,
    pub master: PushOutcome,
    pub standby: PushOutcome,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        self.master.is_delivered() && self.standby.is_delivered()
    }
}

/// Pushes the new topology to every subscriber after a primary transition.
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<AgentContext>,
    registry: SubscriberRegistry,
    client: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<AgentContext>, registry: SubscriberRegistry) -> Result<Self> {
        let client = push_client(ctx.settings.push_timeout)?;
        let permits = Arc::new(Semaphore::new(ctx.settings.max_pushes.max(1)));
        Ok(Self {
            ctx,
            registry,
            client,
            permits,
        })
    }

    /// Handles transitions one at a time until shutdown or until the monitor
    /// drops its sender.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<PrimaryTransition>,
        mut shutdown: watch::Receiver<bool>,
    ) {
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
                event = events.recv() => match event {
                    Some(event) => {
                        let reports = self.notify(&event).await;
                        let failed = reports.iter().filter(|r| !r.delivered()).count();
                        log::info!(
                            "Primary change pushed to {} subscribers, {} failed",
                            reports.len(),
                            failed
                        );
                    }
                    None => break,
                },
            }
        }
        log::info!("Dispatcher stopped");
    }

    /// Reads the current subscribers and pushes this node's master and standby
    /// info to each of them.
    pub async fn notify(&self, event: &PrimaryTransition) -> Vec<DeliveryReport> {
        let identity = &self.ctx.identity;
        let Some(master_info) = identity.master_info() else {
            log::warn!(
                "Node {} became primary (was '{}') but its address is unknown, nothing pushed",
                identity.node_id,
                event.previous_role
            );
            return Vec::new();
        };
        let standby_info = identity.standby_info();

        let Some(subscribers) = self.registry.list().await else {
            log::info!("No receive address registered, nothing pushed");
            return Vec::new();
        };
        self.fan_out(subscribers, &master_info, &standby_info).await
    }

    /// One task per subscriber, at most `max_pushes` in flight. Returns once
    /// every push has finished or timed out.
    pub async fn fan_out(
        &self,
        subscribers: HashMap<String, String>,
        master_info: &str,
        standby_info: &str,
    ) -> Vec<DeliveryReport> {
        let mut tasks = JoinSet::new();
        for (subscriber, url) in subscribers {
            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                log::error!("Push limiter closed, dropping remaining subscribers");
                break;
            };
            let client = self.client.clone();
            let master_info = master_info.to_string();
            let standby_info = standby_info.to_string();
            tasks.spawn(async move {
                let _permit = permit;
                let master = push(&client, &url, MASTER_INFO_PATH, master_info).await;
                let standby = push(&client, &url, STANDBY_INFO_PATH, standby_info).await;
                DeliveryReport {
                    subscriber,
                    url,
                    master,
                    standby,
                }
            });
        }

        let mut reports = Vec::with_capacity(tasks.len());
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(report) => reports.push(report),
                Err(e) => log::error!("Push task failed: {}", e),
            }
        }
        reports
    }
}

fn push_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout * 2)
        .build()?)
}

async fn push(client: &reqwest::Client, base: &str, resource: &str, body: String) -> PushOutcome {
    let url = format!("{}/{}", base.trim_end_matches('/'), resource);
    log::info!("Sending {} {} to {}", resource, body, url);

    let resp = match client.put(&url).body(body).send().await {
        Ok(resp) => resp,
        Err(e) => {
            log::error!("Failed to send {} to {}: {}", resource, url, e);
            return PushOutcome::Failed(e.to_string());
        }
    };

    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    if (200..300).contains(&status) {
        log::info!("{} accepted by {}: {}", resource, url, text);
        PushOutcome::Delivered(status)
    } else {
        log::warn!("{} rejected by {} with {}: {}", resource, url, status, text);
        PushOutcome::Rejected(status)
    }
}
