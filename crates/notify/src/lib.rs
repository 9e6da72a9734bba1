//! Alert delivery for supervisor health reports.
//!
//! A [`Notification`] goes to a [`Notifier`]: the JSON [`WebhookNotifier`],
//! the SMTP [`EmailNotifier`], or a [`Dispatcher`] fanning out to both.
//! [`TemplateRenderer`] turns reports into subjects and bodies.

pub mod dispatcher;
pub mod email;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::{ChannelDelivery, Dispatcher};
pub use email::{EmailNotifier, SmtpSettings};
pub use templating::TemplateRenderer;
pub use traits::{Notification, Notifier, NotifyError, Severity, SharedNotifier};
pub use webhook::WebhookNotifier;
