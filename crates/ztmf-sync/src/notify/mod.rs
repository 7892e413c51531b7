//! Best-effort sync notifications.

pub mod message;

pub use message::Notification;

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Delivers a rendered message to a chat channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Posts `{"text": ...}` to an incoming-webhook URL.
#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier").finish_non_exhaustive()
    }
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ztmf-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    #[instrument(skip_all)]
    async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Notify(format!(
                "webhook returned status {}",
                status.as_u16()
            )));
        }

        debug!("Notification delivered");
        Ok(())
    }
}
