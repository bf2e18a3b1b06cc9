//! Terminal actions: task board entries and webhook notifications.
//!
//! Every run ends with exactly one call on a [`Sink`]. Failures are
//! reported back to the engine, which logs them and completes the run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SinkError;

/// Task board entry for a routed email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub message_id: String,
    pub original_sender: String,
    pub original_subject: String,
    pub original_body: String,
    /// `None` when no draft could be produced.
    pub ai_drafted_reply: Option<String>,
    pub final_assignee_name: String,
    pub final_assignee_email: String,
    /// Snapshot of the run log, one line per entry.
    pub execution_logs: String,
}

#[async_trait]
pub trait Sink: Send + Sync {
    async fn create_task(&self, task: &TaskRequest) -> Result<(), SinkError>;

    async fn send_reply(&self, message_id: &str, content: &str) -> Result<(), SinkError>;

    async fn report_spam(&self, message_id: &str) -> Result<(), SinkError>;
}

/// Posts JSON to the configured webhook URLs.
pub struct WebhookSink {
    client: reqwest::Client,
    task_url: Option<String>,
    reply_url: Option<String>,
    spam_url: Option<String>,
}

impl WebhookSink {
    pub fn new(
        client: reqwest::Client,
        task_url: Option<String>,
        reply_url: Option<String>,
        spam_url: Option<String>,
    ) -> Self {
        Self {
            client,
            task_url,
            reply_url,
            spam_url,
        }
    }

    async fn post(
        &self,
        endpoint: &'static str,
        url: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError> {
        let url = url.ok_or(SinkError::NotConfigured { endpoint })?;
        debug!(endpoint, url, "Posting to sink");

        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| SinkError::RequestFailed {
                endpoint,
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                endpoint,
                status,
                body,
            });
        }

        info!(endpoint, "Sink accepted payload");
        Ok(())
    }
}

#[async_trait]
impl Sink for WebhookSink {
    async fn create_task(&self, task: &TaskRequest) -> Result<(), SinkError> {
        let payload = serde_json::to_value(task).map_err(|e| SinkError::RequestFailed {
            endpoint: "task board",
            reason: e.to_string(),
        })?;
        self.post("task board", self.task_url.as_deref(), &payload)
            .await
    }

    async fn send_reply(&self, message_id: &str, content: &str) -> Result<(), SinkError> {
        let payload = serde_json::json!({ "message_id": message_id, "content": content });
        self.post("auto-reply webhook", self.reply_url.as_deref(), &payload)
            .await
    }

    async fn report_spam(&self, message_id: &str) -> Result<(), SinkError> {
        let payload = serde_json::json!({ "message_id": message_id });
        self.post("spam webhook", self.spam_url.as_deref(), &payload)
            .await
    }
}
