//! JSON webhook channel.
//!
//! The payload carries a `text` field (subject and body together) that
//! Slack and Mattermost incoming webhooks display as-is, next to the
//! structured fields for receivers that parse them.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::traits::{Notification, Notifier, NotifyError, Severity};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    source: &'static str,
    text: String,
    subject: &'a str,
    body: &'a str,
    severity: Severity,
    tags: &'a BTreeMap<String, String>,
}

impl<'a> WebhookPayload<'a> {
    fn new(n: &'a Notification) -> Self {
        Self {
            source: "sentinel",
            text: format!("*{}*\n{}", n.subject, n.body),
            subject: &n.subject,
            body: &n.body,
            severity: n.severity,
            tags: &n.tags,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// A channel posting to `url`, which must be http or https.
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NotifyError::Config(format!(
                "webhook URL must use http or https, got {}",
                url.scheme()
            )));
        }
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { url, client })
    }

    fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&WebhookPayload::new(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(MAX_ERROR_BODY);
            return Err(NotifyError::Rejected {
                channel: "webhook",
                status: status.as_u16(),
                body,
            });
        }

        // Only the host is logged; webhook paths often embed tokens.
        debug!(host = self.host(), %status, "webhook accepted alert");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
