use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result};

use crate::{cli::args::AgentArgs, domain::identity::NodeIdentity, util};

/// Runtime knobs, fixed once the command line is parsed.
#[derive(Debug, Clone)]
pub struct Settings {
    pub env_file: PathBuf,
    pub allowlist: Option<PathBuf>,
    pub bind: SocketAddr,
    pub poll_interval: Duration,
    pub command_timeout: Duration,
    pub push_timeout: Duration,
    pub max_pushes: usize,
    pub db_check_retries: u32,
    pub db_check_interval: Duration,
}

impl Settings {
    /// Defaults for everything except the env file.
    pub fn new(env_file: impl Into<PathBuf>) -> Self {
        Self {
            env_file: env_file.into(),
            allowlist: None,
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            poll_interval: Duration::from_secs(1),
            command_timeout: Duration::from_secs(5),
            push_timeout: Duration::from_secs(1),
            max_pushes: 64,
            db_check_retries: 10,
            db_check_interval: Duration::from_secs(6),
        }
    }

    /// The env file is made absolute: `sh` looks a bare `. name` up in `$PATH`.
    pub fn from_args(args: &AgentArgs) -> Result<Self> {
        let env_file = std::path::absolute(&args.env_file)
            .with_context(|| format!("invalid env file path {}", args.env_file.display()))?;
        Ok(Self {
            env_file,
            allowlist: args.allowlist.clone(),
            bind: util::parse_bind_addr(&args.bind)?,
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            command_timeout: Duration::from_secs(args.command_timeout_secs),
            push_timeout: Duration::from_millis(args.push_timeout_ms),
            max_pushes: args.max_pushes,
            db_check_retries: args.db_check_retries,
            db_check_interval: Duration::from_secs(args.db_check_interval_secs),
        })
    }
}

/// Everything resolved during startup. Read-only afterwards and shared
/// between the HTTP handlers, the monitor and the dispatcher.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub settings: Settings,
    pub identity: NodeIdentity,
}

impl AgentContext {
    pub fn new(settings: Settings, identity: NodeIdentity) -> Self {
        Self { settings, identity }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn relative_env_file_is_resolved_against_cwd() -> Result<()> {
        let args = AgentArgs::try_parse_from(["cm-restapi", "-e", "envfile"])?;
        let settings = Settings::from_args(&args)?;
        assert!(settings.env_file.is_absolute());
        assert_eq!(settings.env_file, std::env::current_dir()?.join("envfile"));

        let args = AgentArgs::try_parse_from(["cm-restapi", "-e", "/home/omm/env"])?;
        assert_eq!(Settings::from_args(&args)?.env_file, PathBuf::from("/home/omm/env"));
        Ok(())
    }

    #[test]
    fn defaults_follow_flags() -> Result<()> {
        let args = AgentArgs::try_parse_from(["cm-restapi", "-e", "/env", "-B", "127.0.0.1:9000"])?;
        let settings = Settings::from_args(&args)?;
        assert_eq!(settings.bind, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.max_pushes, 64);
        Ok(())
    }
}
