use std::{path::Path, sync::Arc};

use super::{CmdResult, CommandError, CommandRunner};

const CM_CTL: &str = "cm_ctl";
const GS_CTL: &str = "gs_ctl";

/// Detects a running database instance; prints its pid when there is one.
pub const GAUSSDB_PROCESS_CHECK: &str =
    "ps ux | grep -v grep | grep \"bin/gaussdb -D \" | awk '{print $2}'";

/// Builds `cm_ctl` / `gs_ctl` invocations with the cluster environment sourced.
#[derive(Clone)]
pub struct ClusterCtl {
    runner: Arc<dyn CommandRunner>,
    source_env: String,
}

impl ClusterCtl {
    pub fn new(env_file: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            source_env: format!(". {}; ", shell_quote(&env_file.to_string_lossy())),
        }
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    async fn run_with_env(&self, cmd: &str) -> Result<CmdResult, CommandError> {
        let full = format!("{}{}", self.source_env, cmd);
        self.runner.run(&full).await
    }

    /// `gaussdb -V`, used at startup to prove the env file is usable.
    pub async fn database_version(&self) -> Result<CmdResult, CommandError> {
        self.run_with_env("gaussdb -V").await
    }

    pub async fn database_running(&self) -> Result<CmdResult, CommandError> {
        self.runner.run(GAUSSDB_PROCESS_CHECK).await
    }

    /// `gs_ctl query -D <data_path>`, the source of the local role.
    pub async fn local_query(&self, data_path: &str) -> Result<CmdResult, CommandError> {
        self.run_with_env(&format!("{GS_CTL} query -D {}", shell_quote(data_path)))
            .await
    }

    pub async fn query_cluster(&self) -> Result<CmdResult, CommandError> {
        self.run_with_env(&format!("{CM_CTL} query -v")).await
    }

    pub async fn query_node(&self, node_id: u32) -> Result<CmdResult, CommandError> {
        self.run_with_env(&format!("{CM_CTL} query -v -n {node_id}"))
            .await
    }

    /// `cm_ctl view -N`: the static configuration of this node.
    pub async fn view_native(&self) -> Result<CmdResult, CommandError> {
        self.run_with_env(&format!("{CM_CTL} view -N")).await
    }

    pub async fn ddb_get(&self, key: &str, prefix: bool) -> Result<CmdResult, CommandError> {
        self.ddb(DdbAction::Get, prefix, key, None).await
    }

    pub async fn ddb_put(&self, key: &str, value: &str) -> Result<CmdResult, CommandError> {
        self.ddb(DdbAction::Put, false, key, Some(value)).await
    }

    pub async fn ddb_delete(&self, key: &str, prefix: bool) -> Result<CmdResult, CommandError> {
        self.ddb(DdbAction::Delete, prefix, key, None).await
    }

    async fn ddb(
        &self,
        action: DdbAction,
        prefix: bool,
        key: &str,
        value: Option<&str>,
    ) -> Result<CmdResult, CommandError> {
        let mut cmd = format!("{CM_CTL} ddb ");
        if prefix {
            cmd.push_str("--prefix ");
        }
        cmd.push_str(action.flag());
        cmd.push(' ');
        cmd.push_str(&shell_quote(key));
        if let Some(value) = value {
            cmd.push(' ');
            cmd.push_str(&shell_quote(value));
        }
        self.run_with_env(&cmd).await
    }
}

#[derive(Debug, Clone, Copy)]
enum DdbAction {
    Get,
    Put,
    Delete,
}

impl DdbAction {
    fn flag(self) -> &'static str {
        match self {
            DdbAction::Get => "--get",
            DdbAction::Put => "--put",
            DdbAction::Delete => "--delete",
        }
    }
}

/// Quotes `s` as a single POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:=@,+%".contains(&b))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}
