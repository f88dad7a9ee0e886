//! Health summary derived from the persisted document

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

use crate::state::DdnsDocument;

/// A success older than this many intervals counts as stale
pub const STALE_INTERVAL_FACTOR: u64 = 3;

/// Overall health of the updater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Health {
    /// No cycle has ever succeeded
    NotStarted,
    /// The last recorded message is an error
    Error,
    /// The last success is older than the stale threshold
    Delayed,
    Healthy,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::NotStarted => write!(f, "Not started yet"),
            Health::Error => write!(f, "Error"),
            Health::Delayed => write!(f, "Unknown (Checks delayed)"),
            Health::Healthy => write!(f, "Healthy"),
        }
    }
}

/// Snapshot of what the updater last did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub ipv4: Option<IpAddr>,
    pub ipv6: Option<IpAddr>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_update: String,
    pub stale: bool,
    pub last_message: Option<String>,
    pub health: Health,
}

impl StatusReport {
    /// Build the report as seen at `now`
    pub fn from_document(document: &DdnsDocument, now: DateTime<Utc>) -> Self {
        let state = &document.state;
        let last_success = state.last_success;

        let (last_update, stale) = match last_success {
            None => ("Never".to_string(), true),
            Some(at) => {
                let elapsed = now.signed_duration_since(at);
                let threshold = document
                    .config
                    .interval_secs
                    .saturating_mul(STALE_INTERVAL_FACTOR);
                let stale = u64::try_from(elapsed.num_seconds())
                    .map(|secs| secs >= threshold)
                    .unwrap_or(false);
                (time_ago(elapsed), stale)
            }
        };

        let is_error = state
            .last_message
            .as_deref()
            .is_some_and(|message| message.starts_with("Error"));

        let health = if last_success.is_none() {
            Health::NotStarted
        } else if is_error {
            Health::Error
        } else if stale {
            Health::Delayed
        } else {
            Health::Healthy
        };

        Self {
            ipv4: state.last_known_ip.v4,
            ipv6: state.last_known_ip.v6,
            last_success,
            last_update,
            stale,
            last_message: state.last_message.clone(),
            health,
        }
    }
}

fn time_ago(elapsed: chrono::Duration) -> String {
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{} minutes ago", minutes)
    } else {
        format!("{} hours ago", minutes / 60)
    }
}
