// # Notifier Trait
//
// Fire-and-forget alerts about cycle outcomes.
//
// ## Implementations
//
// - ntfy: `ddns-notify-ntfy` crate
// - [`NoopNotifier`]: notifications disabled

use async_trait::async_trait;
use std::fmt;

/// Delivery priority of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Low,
    #[default]
    Default,
    High,
}

impl Priority {
    /// Wire name of the priority
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Default => "default",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short title
    pub title: String,
    /// Plain-text body
    pub message: String,
    /// Delivery priority
    pub priority: Priority,
}

impl Notification {
    /// Create a notification
    pub fn new(title: impl Into<String>, message: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority,
        }
    }
}

/// Trait for notification sinks
///
/// Delivery failures are logged by the implementation and never returned;
/// a broken sink must not change a cycle's outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification, best effort
    async fn notify(&self, notification: Notification);
}

/// Notifier used when notifications are disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: Notification) {
        tracing::trace!("Notifications disabled, dropping '{}'", notification.title);
    }
}
