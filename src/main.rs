use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cm_restapi::{
    agent::Agent,
    bootstrap::{self, ExitCode},
    cli::args::AgentArgs,
    command::{ClusterCtl, ShellRunner},
    context::Settings,
    storage::DdbStore,
};
use log::{error, info};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let args = match AgentArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                ExitCode::InvalidArgument.code()
            } else {
                0
            };
            std::process::exit(code);
        }
    };
    if let Err(e) = AgentArgs::validate(&args) {
        eprintln!("error: {e}");
        std::process::exit(ExitCode::InvalidArgument.code());
    }

    env_logger::Builder::new()
        .filter_level(args.log.into())
        .init();

    if let Err((code, e)) = run(args).await {
        error!("{:#}", e);
        std::process::exit(code.code());
    }
}

async fn run(args: AgentArgs) -> Result<(), (ExitCode, anyhow::Error)> {
    let settings =
        Settings::from_args(&args).map_err(|e| (ExitCode::InvalidArgument, e))?;
    let runner = Arc::new(ShellRunner::new(settings.command_timeout));
    let ctl = ClusterCtl::new(&settings.env_file, runner);

    let ctx = bootstrap::prepare(settings, &ctl)
        .await
        .map_err(|e| (e.exit_code(), e.into()))?;
    let store = Arc::new(DdbStore::new(ctl.clone()));
    let agent = Agent::new(ctx, ctl, store);
    let listener = agent
        .bind()
        .await
        .map_err(|e| (e.exit_code(), e.into()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for signals: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    info!("Agent started");
    agent
        .run(listener, shutdown_rx)
        .await
        .map_err(|e| (ExitCode::Unknown, e))?;
    info!("Agent stopped");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}
