use crate::error::ScoutError;
use crate::models::Snapshot;
use crate::store::{ArtifactId, SnapshotStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Names longer than this are cut in the summary
const MAX_NAME_CHARS: usize = 50;

/// Outbound channel for run summaries
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver `text` once. No retries.
    async fn deliver(&self, text: &str) -> Result<()>;

    fn sink_name(&self) -> &'static str;
}

/// Slack incoming webhook
pub struct SlackWebhook {
    client: Client,
    url: String,
}

impl SlackWebhook {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MessageSink for SlackWebhook {
    async fn deliver(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .context("Failed to reach webhook")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webhook rejected message: {} {}", status, body.trim());
        }

        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "Slack"
    }
}

/// Result of a successful delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub artifact: ArtifactId,
    pub items_sent: usize,
}

/// Sends the newest snapshot to a message sink
pub struct Notifier<'a, S: MessageSink> {
    store: &'a SnapshotStore,
    sink: S,
    top_n: usize,
}

impl<'a, S: MessageSink> Notifier<'a, S> {
    pub fn new(store: &'a SnapshotStore, sink: S, top_n: usize) -> Self {
        Self { store, sink, top_n }
    }

    /// Summarize the snapshot with the greatest date key and deliver it.
    /// Nothing is sent when the store is empty.
    pub async fn notify_latest(&self) -> Result<DeliveryReport, ScoutError> {
        let artifact = self
            .store
            .latest()
            .await?
            .ok_or_else(|| ScoutError::NoArtifactFound {
                dir: self.store.dir().to_path_buf(),
            })?;

        info!("Latest snapshot: {}", artifact.path.display());
        let snapshot = SnapshotStore::load(&artifact.path).await?;
        let message = format_summary(&snapshot, self.top_n);

        match self.sink.deliver(&message).await {
            Ok(()) => {
                info!("✅ {} message sent", self.sink.sink_name());
                Ok(DeliveryReport {
                    artifact,
                    items_sent: snapshot.items.len().min(self.top_n),
                })
            }
            Err(e) => {
                warn!("❌ {} delivery failed: {:#}", self.sink.sink_name(), e);
                Err(ScoutError::Delivery(e))
            }
        }
    }
}

/// Render the top `top_n` records of `snapshot` as Slack mrkdwn
pub fn format_summary(snapshot: &Snapshot, top_n: usize) -> String {
    let mut message = format!(
        "*📊 {} Olive Young ranking TOP{}* ({} items)\n",
        snapshot.date.format("%Y-%m-%d"),
        top_n.min(snapshot.items.len()),
        snapshot.count
    );

    for item in snapshot.items.iter().take(top_n) {
        let name = truncate(&item.name, MAX_NAME_CHARS);
        if item.link.is_empty() {
            message.push_str(&format!("{}. {} — {}\n", item.rank, name, item.price));
        } else {
            message.push_str(&format!(
                "{}. <{}|{}> — {}\n",
                item.rank, item.link, name, item.price
            ));
        }
    }

    message
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}
