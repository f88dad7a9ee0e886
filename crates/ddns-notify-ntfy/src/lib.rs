// # ntfy Notifier
//
// Publishes DDNS alerts to an ntfy topic.
//
// ## Wire Format
//
// ```http
// POST <url>/<topic>
// Title: IP Address Changed
// Priority: high
// Authorization: Bearer <token>      (only when a token is configured)
//
// Records: home.example.com
// IPv4: 203.0.113.7
// IPv6: N/A
// ```
//
// Delivery is best effort: through the `Notifier` trait failures are logged
// and never reach the cycle that triggered them.

use async_trait::async_trait;
use ddns_core::config::{DEFAULT_NTFY_URL, NotificationConfig};
use ddns_core::traits::{Notification, Notifier};
use ddns_core::{Error, Result};
use std::time::Duration;

/// Default HTTP timeout for publishing
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier publishing to an ntfy server
pub struct NtfyNotifier {
    /// Full publish URL (`<server>/<topic>`)
    target: String,

    /// Optional access token
    /// ⚠️ NEVER log this value
    token: Option<String>,

    client: reqwest::Client,
}

impl std::fmt::Debug for NtfyNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NtfyNotifier")
            .field("target", &self.target)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl NtfyNotifier {
    /// Create a notifier for `topic` on the server at `url`
    pub fn new(url: &str, topic: &str, token: Option<String>) -> Result<Self> {
        if topic.trim().is_empty() {
            return Err(Error::config("ntfy topic cannot be empty"));
        }

        let base = if url.trim().is_empty() {
            DEFAULT_NTFY_URL
        } else {
            url.trim_end_matches('/')
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            target: format!("{}/{}", base, topic),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    /// Build from the notification settings; `None` when notifications are off
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>> {
        match config {
            NotificationConfig::Disabled => Ok(None),
            NotificationConfig::Ntfy { url, topic, token } => {
                Self::new(url, topic, token.clone()).map(Some)
            }
        }
    }

    /// Publish URL
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Publish one notification, reporting failures to the caller
    pub async fn send(&self, notification: &Notification) -> Result<()> {
        let mut request = self
            .client
            .post(&self.target)
            .header("Title", notification.title.as_str())
            .header("Priority", notification.priority.as_str())
            .body(notification.message.clone());

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("Error sending ntfy notification: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!(
                "Failed to send ntfy notification: {}",
                response.status()
            )));
        }

        tracing::debug!("Notification '{}' delivered", notification.title);
        Ok(())
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.send(&notification).await {
            tracing::error!("{}", e);
        }
    }
}
