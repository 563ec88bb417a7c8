mod common;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use cm_restapi::{
    agent::Agent,
    command::CmdResult,
    monitor::RoleMonitor,
    registry::SubscriberRegistry,
    storage::MemoryStore,
};
use common::{GS_CTL_QUERY, PushReceiver, ScriptedRunner};
use tokio::sync::watch;

fn gs_query(role: &str) -> CmdResult {
    CmdResult::new(0, GS_CTL_QUERY.replace("Standby", role))
}

#[tokio::test]
async fn monitor_reports_each_promotion_once() -> Result<()> {
    let runner = Arc::new(ScriptedRunner::new().on_seq(
        "gs_ctl query",
        vec![
            gs_query("Standby"),
            CmdResult::new(1, "gs_ctl: no server running"),
            gs_query("Standby"),
            gs_query("Primary"),
            CmdResult::new(0, "garbage without a role"),
            gs_query("Primary"),
        ],
    ));
    let ctx = common::context();
    let mut monitor = RoleMonitor::new(&ctx, common::ctl(runner.clone()));

    let mut events = Vec::new();
    for _ in 0..6 {
        events.push(monitor.poll_once().await);
    }
    let fired: Vec<usize> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.as_ref().map(|_| i + 1))
        .collect();
    assert_eq!(fired, vec![4]);
    assert_eq!(events[3].as_ref().unwrap().previous_role, "Standby");
    assert_eq!(monitor.tracker().current_role(), "Primary");
    assert!(
        runner
            .calls()
            .iter()
            .all(|c| c == ". /home/omm/env; gs_ctl query -D /opt/gauss/data/dn")
    );
    Ok(())
}

#[tokio::test]
async fn promotion_is_pushed_to_registered_subscribers() -> Result<()> {
    let receiver = PushReceiver::spawn(200).await?;
    let dead = common::closed_addr().await?;

    let store = Arc::new(MemoryStore::new());
    let registry = SubscriberRegistry::new(store.clone());
    registry.register("10.0.0.5", None, &receiver.base_url()).await?;
    registry
        .register("10.0.0.6", Some("gone"), &format!("http://{dead}"))
        .await?;

    let runner = Arc::new(ScriptedRunner::new().on_seq(
        "gs_ctl query",
        vec![gs_query("Standby"), gs_query("Standby"), gs_query("Primary")],
    ));
    let agent = Agent::new(common::context(), common::ctl(runner), store);
    let listener = agent.bind().await?;
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(agent.run(listener, rx));

    let got = receiver.wait_for(2, Duration::from_secs(5)).await;
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].1, "/CMRestAPI/MasterInfo");
    assert_eq!(got[0].2, "192.168.0.2:26000");
    assert_eq!(got[1].1, "/CMRestAPI/StandbyInfo");
    assert_eq!(got[1].2, "192.168.0.1:26000,192.168.0.3:26000");

    // Staying primary must not push again.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(receiver.received().len(), 2);

    shutdown.send(true)?;
    tokio::time::timeout(Duration::from_secs(3), task).await???;
    Ok(())
}
