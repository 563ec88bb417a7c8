use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;

use crate::{
    cli::paths::{self, FileProblem},
    command::ClusterCtl,
    context::{AgentContext, Settings},
    domain::identity::NodeIdentity,
    parser::{self, IdentityError},
};

/// Process exit codes, shared with the service scripts that start the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    NoEntry,
    NoProcess,
    NotAFile,
    InvalidArgument,
    Unknown,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::NoEntry => 2,
            ExitCode::NoProcess => 3,
            ExitCode::NotAFile => 21,
            ExitCode::InvalidArgument => 22,
            ExitCode::Unknown => 255,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),
    #[error("env file {} cannot run gaussdb: {reason}", .path.display())]
    InvalidEnv { path: PathBuf, reason: String },
    #[error("database is not running after {attempts} checks")]
    DatabaseNotRunning { attempts: u32 },
    #[error("failed to read static cluster info: {0}")]
    StaticInfo(String),
    #[error("invalid static cluster info: {0}")]
    Identity(#[from] IdentityError),
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl StartupError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            StartupError::Missing(_) => ExitCode::NoEntry,
            StartupError::NotAFile(_) => ExitCode::NotAFile,
            StartupError::InvalidEnv { .. } => ExitCode::InvalidArgument,
            StartupError::DatabaseNotRunning { .. } => ExitCode::NoProcess,
            StartupError::StaticInfo(_) | StartupError::Identity(_) | StartupError::Bind { .. } => {
                ExitCode::Unknown
            }
        }
    }
}

impl From<FileProblem> for StartupError {
    fn from(value: FileProblem) -> Self {
        match value {
            FileProblem::Missing(path) => StartupError::Missing(path),
            FileProblem::NotAFile(path) => StartupError::NotAFile(path),
        }
    }
}

/// Runs every startup check in order and resolves the node identity.
pub async fn prepare(settings: Settings, ctl: &ClusterCtl) -> Result<AgentContext, StartupError> {
    paths::check_regular_file(&settings.env_file)?;
    if let Some(allowlist) = &settings.allowlist {
        paths::check_regular_file(allowlist)?;
    }
    verify_env(ctl, &settings.env_file).await?;
    wait_for_database(ctl, settings.db_check_retries, settings.db_check_interval).await?;
    let identity = load_identity(ctl).await?;
    log::info!(
        "Local node {} (data path {}), master info {}, standby info '{}'",
        identity.node_id,
        identity.data_path,
        identity.master_info().as_deref().unwrap_or("unknown"),
        identity.standby_info()
    );
    Ok(AgentContext::new(settings, identity))
}

/// `gaussdb -V` must succeed with the env file sourced.
pub async fn verify_env(ctl: &ClusterCtl, env_file: &Path) -> Result<(), StartupError> {
    let invalid = |reason: String| StartupError::InvalidEnv {
        path: env_file.to_path_buf(),
        reason,
    };
    let res = ctl
        .database_version()
        .await
        .map_err(|e| invalid(e.to_string()))?;
    if !res.success() {
        return Err(invalid(res.output.trim().to_string()));
    }
    log::info!("Database version: {}", res.output.trim());
    Ok(())
}

/// Looks for the database process up to `retries` times, `interval` apart.
pub async fn wait_for_database(
    ctl: &ClusterCtl,
    retries: u32,
    interval: Duration,
) -> Result<(), StartupError> {
    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        match ctl.database_running().await {
            Ok(res) if res.success() && !res.output.trim().is_empty() => {
                log::info!("Database process found (pid {})", res.output.trim());
                return Ok(());
            }
            Ok(_) => log::warn!(
                "Database is not running, check {}/{} failed",
                attempt,
                attempts
            ),
            Err(e) => log::warn!("Failed to check database process: {}", e),
        }
        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }
    Err(StartupError::DatabaseNotRunning { attempts })
}

pub async fn load_identity(ctl: &ClusterCtl) -> Result<NodeIdentity, StartupError> {
    let output = ctl
        .view_native()
        .await
        .and_then(|r| r.into_output())
        .map_err(|e| StartupError::StaticInfo(e.to_string()))?;
    Ok(parser::parse_identity(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_errno_values() {
        assert_eq!(StartupError::Missing("x".into()).exit_code().code(), 2);
        assert_eq!(
            StartupError::DatabaseNotRunning { attempts: 10 }
                .exit_code()
                .code(),
            3
        );
        assert_eq!(StartupError::NotAFile("x".into()).exit_code().code(), 21);
        assert_eq!(
            StartupError::InvalidEnv {
                path: "x".into(),
                reason: String::new()
            }
            .exit_code()
            .code(),
            22
        );
        assert_eq!(
            StartupError::Identity(IdentityError::MissingNodeId)
                .exit_code()
                .code(),
            255
        );
    }
}
