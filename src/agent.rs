use std::sync::Arc;

use anyhow::Result;
use tokio::{
    net::TcpListener,
    sync::{mpsc, watch},
};

use crate::{
    admin::{authz::AccessGate, handler::AdminState, http},
    bootstrap::StartupError,
    command::ClusterCtl,
    context::AgentContext,
    monitor::RoleMonitor,
    notify::Dispatcher,
    registry::SubscriberRegistry,
    storage::KvStore,
};

/// The running agent: status API, role monitor and push dispatcher.
pub struct Agent {
    ctx: Arc<AgentContext>,
    ctl: ClusterCtl,
    store: Arc<dyn KvStore>,
}

impl Agent {
    pub fn new(ctx: AgentContext, ctl: ClusterCtl, store: Arc<dyn KvStore>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            ctl,
            store,
        }
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let addr = self.ctx.settings.bind;
        TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind { addr, source })
    }

    /// Runs until `shutdown` flips to true, then waits for all three tasks.
    pub async fn run(self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        let registry = SubscriberRegistry::new(self.store.clone());
        let gate = AccessGate::new(self.ctx.settings.allowlist.clone());
        if let Some(path) = gate.path() {
            match gate.refresh() {
                Some(n) => log::info!("Allowlist {} active with {} addresses", path.display(), n),
                None => log::warn!("Allowlist {} could not be loaded", path.display()),
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let monitor = RoleMonitor::new(&self.ctx, self.ctl.clone());
        let dispatcher = Dispatcher::new(self.ctx.clone(), registry.clone())?;
        let state = Arc::new(AdminState {
            ctx: self.ctx.clone(),
            ctl: self.ctl,
            registry,
            gate,
        });

        let monitor_task = tokio::spawn(monitor.run(events_tx, shutdown.clone()));
        let dispatch_task = tokio::spawn(dispatcher.run(events_rx, shutdown.clone()));
        let served = http::run_http_server(listener, state, shutdown).await;

        if let Err(e) = monitor_task.await {
            log::error!("Role monitor task failed: {}", e);
        }
        if let Err(e) = dispatch_task.await {
            log::error!("Dispatcher task failed: {}", e);
        }
        served
    }
}
