use core::fmt;
use std::{fmt::Display, path::PathBuf, str::FromStr};

use anyhow::Result;
use clap::{Parser, builder::TypedValueParser};

use crate::util;

#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct AgentArgs {
    /// Environment file sourced before every cm_ctl / gs_ctl call
    #[arg(short = 'e', long, value_name = "ENV_FILE", value_hint = clap::ValueHint::FilePath)]
    pub env_file: PathBuf,

    /// File with one allowed client IP per line; every client is allowed without it
    #[arg(short = 'w', long, value_name = "ALLOWLIST_FILE", value_hint = clap::ValueHint::FilePath)]
    pub allowlist: Option<PathBuf>,

    /// Address the status API listens on
    #[arg(long, short = 'B', value_name = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Log level, default is info
    #[arg(
        long,
        short = 'L',
        default_value_t = LogLevel::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["trace", "debug", "info", "warn", "error", "off"])
            .map(|s| s.parse::<LogLevel>().unwrap()),
    )]
    pub log: LogLevel,

    /// How often the local role is polled
    #[arg(long, value_name = "MILLIS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Wall-clock limit of one cm_ctl / gs_ctl call
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub command_timeout_secs: u64,

    /// Connect and response timeout of each push to a subscriber
    #[arg(long, value_name = "MILLIS", default_value_t = 1000)]
    pub push_timeout_ms: u64,

    /// Subscribers pushed to at the same time
    #[arg(long, value_name = "N", default_value_t = 64)]
    pub max_pushes: usize,

    /// How many times to look for the database process before giving up
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub db_check_retries: u32,

    #[arg(long, value_name = "SECS", default_value_t = 6)]
    pub db_check_interval_secs: u64,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "off" => LogLevel::Off,
            _ => anyhow::bail!("Invalid log level: {}", s),
        };
        Ok(level)
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        };
        write!(f, "{}", text)
    }
}

impl AgentArgs {
    pub fn validate(args: &Self) -> Result<()> {
        let _ = util::parse_bind_addr(&args.bind)?;

        if args.poll_interval_ms == 0 {
            anyhow::bail!("poll interval must be positive");
        }
        if args.command_timeout_secs == 0 {
            anyhow::bail!("command timeout must be positive");
        }
        if args.push_timeout_ms == 0 {
            anyhow::bail!("push timeout must be positive");
        }
        if args.max_pushes == 0 {
            anyhow::bail!("max pushes must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_flags_like_the_init_scripts() {
        let args = AgentArgs::try_parse_from(["cm-restapi", "-e", "/home/omm/env", "-w", "/etc/allow"])
            .unwrap();
        assert_eq!(args.env_file, PathBuf::from("/home/omm/env"));
        assert_eq!(args.allowlist, Some(PathBuf::from("/etc/allow")));
        assert_eq!(args.bind, "0.0.0.0:8080");
        assert_eq!(args.poll_interval_ms, 1000);
        AgentArgs::validate(&args).unwrap();
    }

    #[test]
    fn env_file_is_required() {
        assert!(AgentArgs::try_parse_from(["cm-restapi"]).is_err());
    }

    #[test]
    fn validate_rejects_invalid_bind_and_zero_limits() {
        let mut args = AgentArgs::try_parse_from(["cm-restapi", "-e", "env"]).unwrap();
        args.bind = "not-an-addr".to_string();
        assert!(AgentArgs::validate(&args).is_err());

        let mut args = AgentArgs::try_parse_from(["cm-restapi", "-e", "env"]).unwrap();
        args.max_pushes = 0;
        assert!(AgentArgs::validate(&args).is_err());
    }

    #[test]
    fn log_level_round_trips_through_text() {
        for name in ["trace", "debug", "info", "warn", "error", "off"] {
            assert_eq!(name.parse::<LogLevel>().unwrap().to_string(), name);
        }
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
