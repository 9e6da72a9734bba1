//! Fan-out of one alert to every configured channel.
//!
//! Channels are sent to concurrently and fail independently. As a
//! [`Notifier`] the dispatcher succeeds when at least one channel delivered.

use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, warn};

use crate::traits::{Notification, Notifier, NotifyError};

/// What happened on one channel.
#[derive(Debug)]
pub struct ChannelDelivery {
    pub channel: String,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

impl ChannelDelivery {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Default)]
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn push(&mut self, channel: Box<dyn Notifier>) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel_name()).collect()
    }

    /// Send to every channel, one [`ChannelDelivery`] per channel in
    /// registration order.
    pub async fn deliver(&self, notification: &Notification) -> Vec<ChannelDelivery> {
        join_all(self.channels.iter().map(|channel| async move {
            let started = Instant::now();
            let result = channel.send(notification).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => info!(
                    channel = channel.channel_name(),
                    severity = %notification.severity,
                    elapsed_ms,
                    "alert delivered"
                ),
                Err(e) => warn!(
                    channel = channel.channel_name(),
                    severity = %notification.severity,
                    elapsed_ms,
                    error = %e,
                    "alert delivery failed"
                ),
            }

            ChannelDelivery {
                channel: channel.channel_name().to_string(),
                elapsed_ms,
                error: result.err().map(|e| e.to_string()),
            }
        }))
        .await
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.channels.is_empty() {
            return Err(NotifyError::Config("no alert channels configured".to_string()));
        }

        let deliveries = self.deliver(notification).await;
        if deliveries.iter().any(ChannelDelivery::delivered) {
            return Ok(());
        }
        Err(NotifyError::Undelivered(
            deliveries
                .into_iter()
                .filter_map(|d| d.error.map(|e| format!("{}: {e}", d.channel)))
                .collect(),
        ))
    }

    fn channel_name(&self) -> &str {
        "dispatcher"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingChannel {
        name: &'static str,
        sends: Arc<AtomicUsize>,
        refuse: bool,
    }

    #[async_trait]
    impl Notifier for CountingChannel {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                return Err(NotifyError::Rejected {
                    channel: "webhook",
                    status: 503,
                    body: "busy".into(),
                });
            }
            Ok(())
        }

        fn channel_name(&self) -> &str {
            self.name
        }
    }

    fn channel(name: &'static str, refuse: bool) -> (Box<dyn Notifier>, Arc<AtomicUsize>) {
        let sends = Arc::new(AtomicUsize::new(0));
        let channel = CountingChannel {
            name,
            sends: sends.clone(),
            refuse,
        };
        (Box::new(channel), sends)
    }

    fn alert() -> Notification {
        Notification::warning("[sentinel] 1 health alert", "- No successful daily-filings run on record")
    }

    #[tokio::test]
    async fn every_channel_receives_the_alert() {
        let (hook, hook_sends) = channel("webhook", false);
        let (mail, mail_sends) = channel("email", false);
        let dispatcher = Dispatcher::new(vec![hook, mail]);

        let deliveries = dispatcher.deliver(&alert()).await;

        assert_eq!(deliveries.len(), 2);
        assert!(deliveries.iter().all(ChannelDelivery::delivered));
        assert_eq!(deliveries[1].channel, "email");
        assert_eq!(hook_sends.load(Ordering::SeqCst), 1);
        assert_eq!(mail_sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_refusing_channel_does_not_block_the_other() {
        let (hook, _) = channel("webhook", true);
        let (mail, mail_sends) = channel("email", false);
        let dispatcher = Dispatcher::new(vec![hook, mail]);

        let deliveries = dispatcher.deliver(&alert()).await;
        assert!(!deliveries[0].delivered());
        assert!(deliveries[0].error.as_deref().unwrap_or_default().contains("503"));
        assert_eq!(mail_sends.load(Ordering::SeqCst), 1);

        assert!(dispatcher.send(&alert()).await.is_ok());
    }

    #[tokio::test]
    async fn send_fails_when_nothing_was_delivered() {
        let (hook, _) = channel("webhook", true);
        let (mail, _) = channel("email", true);
        let dispatcher = Dispatcher::new(vec![hook, mail]);

        match dispatcher.send(&alert()).await {
            Err(NotifyError::Undelivered(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].starts_with("webhook: "));
                assert!(errors[1].starts_with("email: "));
            }
            other => panic!("expected Undelivered, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_channels_is_a_configuration_error() {
        let dispatcher = Dispatcher::default();
        assert!(dispatcher.is_empty());
        assert!(dispatcher.deliver(&alert()).await.is_empty());
        assert!(matches!(
            dispatcher.send(&alert()).await,
            Err(NotifyError::Config(_))
        ));
    }
}
