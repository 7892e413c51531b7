//! One invocation end to end: connect, sync, notify, close.

use crate::cancel::guard;
use crate::cfacts::CFACTS_TABLE;
use crate::config::Config;
use crate::context::SyncContext;
use crate::error::Result;
use crate::event::Invocation;
use crate::notify::{Notification, Notifier, SlackNotifier};
use crate::sync::{SyncKind, SyncResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub fn sync_kind(invocation: &Invocation) -> SyncKind {
    match invocation {
        Invocation::Tables(_) => SyncKind::Tables,
        Invocation::File(_) => SyncKind::CfactsFile,
        Invocation::Warehouse(_) => SyncKind::CfactsWarehouse,
    }
}

/// Where synced data lands, as worded in notifications.
pub fn destination_label(kind: SyncKind) -> &'static str {
    match kind {
        SyncKind::Tables => "the warehouse",
        SyncKind::CfactsFile | SyncKind::CfactsWarehouse => "the ZTMF database",
    }
}

/// Builds the message for `outcome`.
pub fn notification_for(
    environment: &str,
    invocation: &Invocation,
    outcome: &Result<SyncResult>,
    elapsed: Duration,
) -> Notification {
    let kind = sync_kind(invocation);
    let trigger = format!("{}/{}", kind.label(), invocation.trigger());
    let destination = destination_label(kind);

    match outcome {
        Ok(result) => Notification::from_result(result, environment, &trigger, destination),
        Err(e) => {
            let table = match kind {
                SyncKind::Tables => "all tables",
                SyncKind::CfactsFile | SyncKind::CfactsWarehouse => CFACTS_TABLE,
            };
            Notification::aborted(
                environment,
                &trigger,
                destination,
                table,
                &e.to_string(),
                invocation.dry_run(),
                elapsed,
            )
        },
    }
}

/// Sends the notification for `outcome`. Delivery problems are logged only.
pub async fn report(
    notifier: Option<&dyn Notifier>,
    environment: &str,
    invocation: &Invocation,
    outcome: &Result<SyncResult>,
    elapsed: Duration,
    cancel: &CancellationToken,
) {
    let Some(notifier) = notifier else {
        debug!("Notifications disabled");
        return;
    };

    let text = notification_for(environment, invocation, outcome, elapsed).render(Utc::now());
    match guard(cancel, "notify", notifier.send(&text)).await {
        Ok(()) => info!("Sync notification sent"),
        Err(e) => warn!(error = %e, "Failed to send sync notification"),
    }
}

fn notifier_from(config: &Config) -> Option<Arc<dyn Notifier>> {
    let url = config.notifier.webhook_url.as_deref()?;
    match SlackNotifier::new(url, Duration::from_secs(config.notifier.timeout_secs)) {
        Ok(notifier) => Some(Arc::new(notifier)),
        Err(e) => {
            warn!(error = %e, "Failed to initialize notifier; continuing without notifications");
            None
        },
    }
}

/// Runs `invocation` against the stores in `config`.
///
/// Pools are closed before returning whatever the outcome, and a notification
/// is attempted for success and failure alike.
pub async fn run(config: &Config, invocation: &Invocation, cancel: &CancellationToken) -> Result<SyncResult> {
    let clock = Instant::now();
    info!(
        environment = %config.environment,
        kind = sync_kind(invocation).label(),
        trigger = %invocation.trigger(),
        dry_run = invocation.dry_run(),
        "Sync invocation started"
    );

    let outcome = match SyncContext::connect(config, invocation, cancel).await {
        Ok(context) => {
            let outcome = match context.dispatcher(config) {
                Ok(dispatcher) => dispatcher.dispatch(invocation, cancel).await,
                Err(e) => Err(e),
            };
            context.close().await;
            outcome
        },
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(result) if result.is_success() => info!(summary = %result.summary(), "Sync invocation finished"),
        Ok(result) => warn!(summary = %result.summary(), "Sync invocation finished with errors"),
        Err(e) => error!(error = %e, "Sync invocation failed"),
    }

    let notifier = notifier_from(config);
    report(
        notifier.as_deref(),
        &config.environment,
        invocation,
        &outcome,
        clock.elapsed(),
        cancel,
    )
    .await;

    outcome
}
