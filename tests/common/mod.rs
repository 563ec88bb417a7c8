#![allow(dead_code)]

use std::{collections::VecDeque, net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use cm_restapi::{
    admin::http::{HttpResponse, read_http_request, write_response},
    command::{ClusterCtl, CmdResult, CommandError, CommandRunner},
    context::{AgentContext, Settings},
    domain::identity::{NodeIdentity, PeerAddr},
};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::net::TcpListener;

pub const QUERY_V: &str = include_str!("../fixtures/cm_ctl_query_v.txt");
pub const GS_CTL_QUERY: &str = include_str!("../fixtures/gs_ctl_query.txt");

/// Answers commands by substring match. The first matching rule wins; each
/// rule replays its results in order and then repeats the last one.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(String, VecDeque<CmdResult>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, pattern: &str, status: i32, output: &str) -> Self {
        self.on_seq(pattern, vec![CmdResult::new(status, output)])
    }

    pub fn on_seq(self, pattern: &str, results: Vec<CmdResult>) -> Self {
        self.rules
            .lock()
            .push((pattern.to_string(), results.into_iter().collect()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn answer(&self, command: &str) -> CmdResult {
        self.calls.lock().push(command.to_string());
        let mut rules = self.rules.lock();
        for (pattern, results) in rules.iter_mut() {
            if command.contains(pattern.as_str()) {
                return if results.len() > 1 {
                    results.pop_front().unwrap()
                } else {
                    results.front().cloned().unwrap()
                };
            }
        }
        CmdResult::new(127, "command not found")
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, command: &'a str) -> BoxFuture<'a, Result<CmdResult, CommandError>> {
        let res = self.answer(command);
        Box::pin(async move { Ok(res) })
    }
}

pub fn ctl(runner: Arc<ScriptedRunner>) -> ClusterCtl {
    ClusterCtl::new(Path::new("/home/omm/env"), runner)
}

pub fn identity() -> NodeIdentity {
    NodeIdentity {
        node_id: 2,
        data_path: "/opt/gauss/data/dn".to_string(),
        host_ip: Some("192.168.0.2".to_string()),
        port: Some(26000),
        peers: vec![
            PeerAddr {
                ip: "192.168.0.1".to_string(),
                port: 26000,
            },
            PeerAddr {
                ip: "192.168.0.3".to_string(),
                port: 26000,
            },
        ],
    }
}

pub fn context() -> AgentContext {
    let mut settings = Settings::new("/home/omm/env");
    settings.bind = "127.0.0.1:0".parse().unwrap();
    settings.poll_interval = Duration::from_millis(20);
    settings.push_timeout = Duration::from_millis(500);
    AgentContext::new(settings, identity())
}

/// A subscriber endpoint that records every request it gets.
pub struct PushReceiver {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl PushReceiver {
    pub async fn spawn(status: u16) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let sink = sink.clone();
                tokio::spawn(async move {
                    if let Ok(req) = read_http_request(&mut stream).await {
                        sink.lock().push((
                            req.method,
                            req.target,
                            String::from_utf8_lossy(&req.body).into_owned(),
                        ));
                        let _ = write_response(&mut stream, &HttpResponse::text(status, "ok")).await;
                    }
                });
            }
        });
        Ok(Self { addr, received })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/CMRestAPI", self.addr)
    }

    /// (method, target, body) of every request so far.
    pub fn received(&self) -> Vec<(String, String, String)> {
        self.received.lock().clone()
    }

    pub async fn wait_for(&self, count: usize, within: Duration) -> Vec<(String, String, String)> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let got = self.received();
            if got.len() >= count || tokio::time::Instant::now() >= deadline {
                return got;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// An address nothing listens on.
pub async fn closed_addr() -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}
