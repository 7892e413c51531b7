//! ZTMF Sync - Main entry point

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use ztmf_common::logging::{init_logging, LogConfig, LogLevel};
use ztmf_sync::{cli::Cli, config::Config, runner};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; LOG_* variables take precedence over these defaults
    let defaults = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .log_file_prefix("ztmf-sync")
        .filter_directives("sqlx=warn,aws_config=warn,aws_smithy_runtime=warn,hyper=warn,reqwest=warn")
        .build();
    let log_config = LogConfig::from_env_with(defaults.clone()).unwrap_or(defaults);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Sync failed");
            ExitCode::FAILURE
        },
    }
}

/// Runs the requested sync. `Ok(false)` means it completed with table errors.
async fn execute(cli: Cli) -> Result<bool> {
    let config = Config::load()?;
    info!(environment = %config.environment, "Configuration loaded");

    let invocation = cli.command.into_invocation(&config.environment).await?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));
    if let Some(secs) = cli.timeout_secs.or(config.sync.timeout_secs) {
        tokio::spawn(cancel_after(cancel.clone(), Duration::from_secs(secs)));
    }

    let result = runner::run(&config, &invocation, &cancel).await?;
    info!(result = %serde_json::to_string(&result)?, "Sync result");
    Ok(result.is_success())
}

async fn cancel_after(cancel: CancellationToken, deadline: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(deadline) => {
            warn!(seconds = deadline.as_secs(), "Sync deadline reached, cancelling");
            cancel.cancel();
        },
        _ = cancel.cancelled() => {},
    }
}

/// Cancels `cancel` on Ctrl+C or SIGTERM.
async fn cancel_on_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, cancelling sync"),
        _ = terminate => info!("Received terminate signal, cancelling sync"),
    }
    cancel.cancel();
}
