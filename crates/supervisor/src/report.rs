use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use sentinel_notify::{Notification, TemplateRenderer};

const SUBJECT_TEMPLATE: &str = "[sentinel] {{ alerts | length | plural('health alert') }}";

const BODY_TEMPLATE: &str = "\
Health check at {{ timestamp }}

Alerts:
{{ alerts | bullets }}
{% if actions %}
Actions taken:
{{ actions | bullets }}
{% endif %}{% if jobs_triggered %}
Jobs triggered:
{{ jobs_triggered | bullets }}
{% endif %}";

/// Result of one supervisor cycle. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub stuck_jobs_fixed: usize,
    #[serde(flatten)]
    pub flags: BTreeMap<String, bool>,
    pub alerts: Vec<String>,
    pub actions: Vec<String>,
    pub jobs_triggered: Vec<String>,
}

impl HealthReport {
    /// An empty report with every named flag lowered.
    pub fn new<'a>(timestamp: DateTime<Utc>, flags: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            timestamp,
            stuck_jobs_fixed: 0,
            flags: flags.into_iter().map(|f| (f.to_string(), false)).collect(),
            alerts: Vec::new(),
            actions: Vec::new(),
            jobs_triggered: Vec::new(),
        }
    }

    pub fn raise(&mut self, flag: &str) {
        self.flags.insert(flag.to_string(), true);
    }

    pub fn flag(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }

    pub fn is_healthy(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Render the report as an alert notification.
    pub fn to_notification(&self, renderer: &TemplateRenderer) -> Notification {
        let subject = renderer
            .render(SUBJECT_TEMPLATE, self)
            .unwrap_or_else(|_| format!("[sentinel] health alerts: {}", self.alerts.len()));
        let body = renderer.render(BODY_TEMPLATE, self).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "health report template failed; sending plain body");
            self.alerts.join("\n")
        });

        Notification::warning(subject, body)
            .with_tag("stuck_jobs_fixed", self.stuck_jobs_fixed)
            .with_tag("jobs_triggered", self.jobs_triggered.len())
    }
}
