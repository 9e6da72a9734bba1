//! SMTP email channel.
//!
//! Port 465 uses implicit TLS. Any other port uses STARTTLS unless TLS is
//! turned off, which local relays and SMTP test sinks need.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::traits::{Notification, Notifier, NotifyError, Severity};

const DEFAULT_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from = mailbox(&settings.from)?;
        let to = settings
            .to
            .iter()
            .map(|addr| mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Config("email alerts need at least one recipient".into()));
        }

        let port = settings.port.unwrap_or(DEFAULT_PORT);
        let host = settings.host.as_str();
        let mut builder = match (port, settings.tls.unwrap_or(true)) {
            (465, _) => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            (_, true) => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            (_, false) => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| NotifyError::Config(format!("SMTP relay {host}: {e}")))?
        .port(port);

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    fn compose(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let subject = match notification.severity {
            Severity::Critical => format!("[CRITICAL] {}", notification.subject),
            Severity::Warning => notification.subject.clone(),
        };

        let mut body = notification.body.clone();
        if !notification.tags.is_empty() {
            body.push_str("\n\n--\n");
            for (key, value) in &notification.tags {
                body.push_str(&format!("{key}: {value}\n"));
            }
        }

        self.to
            .iter()
            .fold(Message::builder().from(self.from.clone()), |b, rcpt| b.to(rcpt.clone()))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

fn mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.trim()
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::Config(format!("bad email address {addr:?}: {e}")))
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.compose(notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        info!(recipients = self.to.len(), severity = %notification.severity, "alert email sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
