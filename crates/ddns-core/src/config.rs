//! Configuration types for the DDNS system
//!
//! The user-editable half of the persisted document. Keys are camelCase so
//! that existing `config.json` files keep loading unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::traits::AddressFamily;

/// Default check interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Smallest accepted check interval in seconds
pub const MIN_INTERVAL_SECS: u64 = 10;

/// Default ntfy server
pub const DEFAULT_NTFY_URL: &str = "https://ntfy.sh";

/// Main DDNS configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DdnsConfig {
    /// Provider API token
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Hostnames kept in sync with the detected address
    pub records: Vec<String>,

    /// Delay between the end of one cycle and the start of the next
    #[serde(rename = "interval", default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Whether IPv4 (A records) is managed
    #[serde(default = "default_enabled")]
    pub ipv4: bool,

    /// Whether IPv6 (AAAA records) is managed
    #[serde(default = "default_enabled")]
    pub ipv6: bool,

    /// Notification sink
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl DdnsConfig {
    /// Create a configuration with defaults for everything but the
    /// credential and the managed hostnames
    pub fn new(api_token: impl Into<String>, records: Vec<String>) -> Self {
        Self {
            api_token: api_token.into(),
            records,
            interval_secs: DEFAULT_INTERVAL_SECS,
            ipv4: true,
            ipv6: true,
            notifications: NotificationConfig::Disabled,
        }
    }

    /// Set the check interval
    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Enable or disable an address family
    pub fn with_family(mut self, family: AddressFamily, enabled: bool) -> Self {
        match family {
            AddressFamily::V4 => self.ipv4 = enabled,
            AddressFamily::V6 => self.ipv6 = enabled,
        }
        self
    }

    /// Set the notification sink
    pub fn with_notifications(mut self, notifications: NotificationConfig) -> Self {
        self.notifications = notifications;
        self
    }

    /// Whether `family` is managed
    pub fn is_enabled(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::V4 => self.ipv4,
            AddressFamily::V6 => self.ipv6,
        }
    }

    /// The managed families, v4 first
    pub fn enabled_families(&self) -> Vec<AddressFamily> {
        AddressFamily::ALL
            .into_iter()
            .filter(|family| self.is_enabled(*family))
            .collect()
    }

    /// Whether `hostname` is one of the managed records
    pub fn manages(&self, hostname: &str) -> bool {
        self.records
            .iter()
            .any(|record| record.eq_ignore_ascii_case(hostname))
    }

    /// The check interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// A copy safe to display, with every secret masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api_token = mask(&copy.api_token);
        if let NotificationConfig::Ntfy { token: Some(token), .. } = &mut copy.notifications {
            *token = mask(token);
        }
        copy
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.trim().is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }

        let token_lower = self.api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            return Err(crate::Error::config(
                "API token appears to be a placeholder. Use an actual API token from your DNS provider.",
            ));
        }

        if self.records.is_empty() {
            return Err(crate::Error::config("No records configured"));
        }

        for record in &self.records {
            validate_hostname(record)?;
        }

        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Interval must be at least {} seconds. Got: {}",
                MIN_INTERVAL_SECS, self.interval_secs
            )));
        }

        if !self.ipv4 && !self.ipv6 {
            return Err(crate::Error::config(
                "At least one of IPv4 and IPv6 must be enabled",
            ));
        }

        self.notifications.validate()
    }
}

impl fmt::Debug for DdnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdnsConfig")
            .field("api_token", &"<REDACTED>")
            .field("records", &self.records)
            .field("interval_secs", &self.interval_secs)
            .field("ipv4", &self.ipv4)
            .field("ipv6", &self.ipv6)
            .field("notifications", &self.notifications)
            .finish()
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_enabled() -> bool {
    true
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Validate that a string is a valid DNS hostname
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_hostname(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for (index, label) in domain.split('.').enumerate() {
        // Wildcard records: `*` only as the whole leftmost label
        if index == 0 && label == "*" {
            continue;
        }

        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// Notification sink configuration
///
/// On disk this is the `{ enabled, provider, ntfy: { url, topic, token } }`
/// block; anything that does not describe a usable sink reads as `Disabled`.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawNotifications", into = "RawNotifications")]
pub enum NotificationConfig {
    /// No notifications are sent
    #[default]
    Disabled,

    /// Publish to an ntfy topic
    Ntfy {
        /// Server base URL
        url: String,
        /// Topic name
        topic: String,
        /// Optional bearer token
        token: Option<String>,
    },
}

impl NotificationConfig {
    /// Create an ntfy configuration on the public server
    pub fn ntfy(topic: impl Into<String>) -> Self {
        NotificationConfig::Ntfy {
            url: DEFAULT_NTFY_URL.to_string(),
            topic: topic.into(),
            token: None,
        }
    }

    /// Whether notifications are sent at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self, NotificationConfig::Disabled)
    }

    /// Validate the notification configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotificationConfig::Disabled => Ok(()),
            NotificationConfig::Ntfy { url, topic, .. } => {
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "ntfy URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if topic.trim().is_empty() || topic.contains('/') {
                    return Err(crate::Error::config(format!(
                        "ntfy topic is not valid: '{}'",
                        topic
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationConfig::Disabled => f.write_str("Disabled"),
            NotificationConfig::Ntfy { url, topic, token } => f
                .debug_struct("Ntfy")
                .field("url", url)
                .field("topic", topic)
                .field("token", &token.as_ref().map(|_| "<REDACTED>"))
                .finish(),
        }
    }
}

/// On-disk shape of the notification block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawNotifications {
    #[serde(default)]
    enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ntfy: Option<RawNtfy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawNtfy {
    #[serde(default)]
    url: String,
    #[serde(default)]
    topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl From<RawNotifications> for NotificationConfig {
    fn from(raw: RawNotifications) -> Self {
        if !raw.enabled {
            return NotificationConfig::Disabled;
        }

        match raw.provider.as_deref() {
            None | Some("ntfy") => {}
            Some(other) => {
                tracing::warn!("Unknown notification provider '{}', notifications disabled", other);
                return NotificationConfig::Disabled;
            }
        }

        match raw.ntfy {
            Some(ntfy) if !ntfy.topic.trim().is_empty() => NotificationConfig::Ntfy {
                url: if ntfy.url.trim().is_empty() {
                    DEFAULT_NTFY_URL.to_string()
                } else {
                    ntfy.url
                },
                topic: ntfy.topic,
                token: ntfy.token.filter(|token| !token.is_empty()),
            },
            _ => NotificationConfig::Disabled,
        }
    }
}

impl From<NotificationConfig> for RawNotifications {
    fn from(config: NotificationConfig) -> Self {
        match config {
            NotificationConfig::Disabled => RawNotifications::default(),
            NotificationConfig::Ntfy { url, topic, token } => RawNotifications {
                enabled: true,
                provider: Some("ntfy".to_string()),
                ntfy: Some(RawNtfy { url, topic, token }),
            },
        }
    }
}
