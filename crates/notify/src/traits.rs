//! Alert notifications and the channel trait.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{channel} rejected the alert with status {status}: {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("notifier misconfigured: {0}")]
    Config(String),

    #[error("no channel delivered the alert: {}", .0.join("; "))]
    Undelivered(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Something in the job fleet needs a look.
    Warning,
    /// The supervisor itself could not run.
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert, already rendered.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    /// Short facts about the alert (counts, job names). Email renders them
    /// as a footer, the webhook sends them as fields.
    pub tags: BTreeMap<String, String>,
}

impl Notification {
    pub fn warning(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, subject, body)
    }

    pub fn critical(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_severity(Severity::Critical, subject, body)
    }

    fn with_severity(severity: Severity, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            severity,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.tags.insert(key.into(), value.to_string());
        self
    }
}

/// A delivery channel for alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Short channel name for logs ("webhook", "email").
    fn channel_name(&self) -> &str;
}

pub type SharedNotifier = Arc<dyn Notifier>;
