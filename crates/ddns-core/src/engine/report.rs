//! Cycle outcome types

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::net::IpAddr;

use crate::state::{LastKnownAddresses, ReconciliationState};
use crate::traits::{AddressFamily, Notification, Priority, ResolvedAddress};

/// What a completed cycle turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Every resolved address matched its last-known value; the provider
    /// was not contacted
    NoChange,
    /// At least one family changed (or had never been recorded)
    Changed,
    /// Nothing changed but the cycle was forced
    Forced,
    /// No enabled family could be resolved
    Unresolved,
}

/// Addresses resolved during one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub v4: Option<ResolvedAddress>,
    pub v6: Option<ResolvedAddress>,
}

impl ResolvedAddresses {
    /// The resolved address of `family`, if resolution succeeded
    pub fn get(&self, family: AddressFamily) -> Option<IpAddr> {
        self.entry(family).map(|resolved| resolved.address)
    }

    /// The full resolution result of `family`
    pub fn entry(&self, family: AddressFamily) -> Option<&ResolvedAddress> {
        match family {
            AddressFamily::V4 => self.v4.as_ref(),
            AddressFamily::V6 => self.v6.as_ref(),
        }
    }

    fn describe(&self, family: AddressFamily) -> String {
        self.get(family)
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// A record whose content was replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub hostname: String,
    pub family: AddressFamily,
    pub previous_content: String,
    pub new_content: IpAddr,
}

/// A record update the provider rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpdate {
    pub hostname: String,
    pub family: AddressFamily,
    pub error: String,
}

/// Outcome of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub forced: bool,
    pub resolved: ResolvedAddresses,
    pub updated: Vec<RecordChange>,
    pub failed: Vec<FailedUpdate>,
    pub finished_at: DateTime<Utc>,
    /// Set when the cycle's result could not be written back
    pub persistence_error: Option<String>,
}

impl CycleReport {
    pub(crate) fn new(kind: CycleKind, forced: bool, resolved: ResolvedAddresses) -> Self {
        Self {
            kind,
            forced,
            resolved,
            updated: Vec::new(),
            failed: Vec::new(),
            finished_at: Utc::now(),
            persistence_error: None,
        }
    }

    /// Whether every attempted record update went through
    pub fn is_clean(&self) -> bool {
        self.kind != CycleKind::Unresolved && self.failed.is_empty()
    }

    /// Status line persisted as the document's last message
    pub fn status_message(&self) -> String {
        if !self.failed.is_empty() {
            let attempted = self.updated.len() + self.failed.len();
            let names: Vec<&str> = self.failed.iter().map(|f| f.hostname.as_str()).collect();
            return format!(
                "Error: {} of {} record update(s) failed: {}",
                self.failed.len(),
                attempted,
                names.join(", ")
            );
        }

        match self.kind {
            CycleKind::NoChange => "Service is running normally.".to_string(),
            CycleKind::Changed => "IP address change applied.".to_string(),
            CycleKind::Forced => "Force update completed successfully.".to_string(),
            CycleKind::Unresolved => "Error: no public address could be resolved".to_string(),
        }
    }

    /// Reconciliation state to persist after this cycle
    ///
    /// A family's last-known address moves only when it resolved this cycle
    /// and none of its record updates failed; otherwise the previous value
    /// is kept so the next cycle sees the change again.
    pub fn next_state(&self, previous: &ReconciliationState) -> ReconciliationState {
        let mut last_known: LastKnownAddresses = previous.last_known_ip;

        for family in AddressFamily::ALL {
            let Some(address) = self.resolved.get(family) else {
                continue;
            };
            if self.failed.iter().any(|failed| failed.family == family) {
                continue;
            }
            last_known.set(family, address);
        }

        ReconciliationState {
            last_known_ip: last_known,
            last_success: if self.kind == CycleKind::Unresolved {
                previous.last_success
            } else {
                Some(self.finished_at)
            },
            last_message: Some(self.status_message()),
        }
    }

    /// Notification announcing this cycle, if it warrants one
    pub fn notification(&self) -> Option<Notification> {
        let (title, priority, preamble) = match self.kind {
            CycleKind::Changed => ("IP Address Changed", Priority::High, ""),
            CycleKind::Forced => (
                "Force Update Completed",
                Priority::Default,
                "Manual force update triggered.\n",
            ),
            CycleKind::NoChange | CycleKind::Unresolved => return None,
        };

        let mut hostnames: Vec<&str> = Vec::new();
        for change in &self.updated {
            if !hostnames.contains(&change.hostname.as_str()) {
                hostnames.push(&change.hostname);
            }
        }

        let mut message = String::from(preamble);
        let _ = writeln!(
            message,
            "Records: {}",
            if hostnames.is_empty() {
                "none updated".to_string()
            } else {
                hostnames.join(", ")
            }
        );
        if !self.failed.is_empty() {
            let failed: Vec<&str> = self.failed.iter().map(|f| f.hostname.as_str()).collect();
            let _ = writeln!(message, "Failed: {}", failed.join(", "));
        }
        let _ = writeln!(message, "IPv4: {}", self.resolved.describe(AddressFamily::V4));
        let _ = write!(message, "IPv6: {}", self.resolved.describe(AddressFamily::V6));

        Some(Notification::new(title, message, priority))
    }
}
