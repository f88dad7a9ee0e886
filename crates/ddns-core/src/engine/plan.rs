//! Decision rules of a cycle
//!
//! Pure functions: given the snapshot, what was resolved and whether the
//! cycle is forced, decide whether to contact the provider and which records
//! to write.

use std::net::IpAddr;
use tracing::{debug, info};

use super::report::{CycleKind, ResolvedAddresses};
use crate::config::DdnsConfig;
use crate::state::LastKnownAddresses;
use crate::traits::{AddressFamily, ManagedRecord};

/// Result of the DECIDING step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub kind: CycleKind,
    /// Families whose records are reconciled this cycle
    pub families: Vec<AddressFamily>,
}

impl Decision {
    /// Whether the provider has to be contacted
    pub fn warrants_update(&self) -> bool {
        matches!(self.kind, CycleKind::Changed | CycleKind::Forced)
    }
}

/// Decide whether this cycle updates anything
///
/// A resolution failure is never a change: an unresolved family is simply
/// left out. A family with no last-known address counts as changed, which
/// makes the very first cycle run an update pass.
pub fn decide(
    config: &DdnsConfig,
    last_known: &LastKnownAddresses,
    resolved: &ResolvedAddresses,
    force: bool,
) -> Decision {
    let available: Vec<AddressFamily> = config
        .enabled_families()
        .into_iter()
        .filter(|family| resolved.get(*family).is_some())
        .collect();

    if available.is_empty() {
        return Decision {
            kind: CycleKind::Unresolved,
            families: Vec::new(),
        };
    }

    let changed: Vec<AddressFamily> = available
        .iter()
        .copied()
        .filter(|family| {
            let previous = last_known.get(*family);
            let current = resolved.get(*family);
            if previous != current {
                info!(
                    "{} changed: {} -> {}",
                    family,
                    previous.map(|ip| ip.to_string()).unwrap_or_else(|| "None".to_string()),
                    current.map(|ip| ip.to_string()).unwrap_or_default()
                );
                true
            } else {
                false
            }
        })
        .collect();

    if !changed.is_empty() {
        Decision {
            kind: CycleKind::Changed,
            families: if force { available } else { changed },
        }
    } else if force {
        Decision {
            kind: CycleKind::Forced,
            families: available,
        }
    } else {
        Decision {
            kind: CycleKind::NoChange,
            families: Vec::new(),
        }
    }
}

/// Pick the record writes for this cycle
///
/// A record is written when it is a managed hostname, its family is being
/// reconciled, and either the cycle is forced or its content differs from
/// the resolved address.
pub fn plan_updates(
    config: &DdnsConfig,
    records: &[ManagedRecord],
    resolved: &ResolvedAddresses,
    decision: &Decision,
    force: bool,
) -> Vec<(ManagedRecord, IpAddr)> {
    let mut planned = Vec::new();

    for record in records {
        if !config.manages(&record.name) || !decision.families.contains(&record.family) {
            continue;
        }

        let Some(address) = resolved.get(record.family) else {
            continue;
        };

        if force || !record.points_to(&address) {
            info!(
                "Updating {} ({}) to {}",
                record.name,
                record.family.record_type(),
                address
            );
            planned.push((record.clone(), address));
        } else {
            info!(
                "Record {} ({}) is already up to date.",
                record.name,
                record.family.record_type()
            );
        }
    }

    planned
}

/// Managed hostnames with no record of a reconciled family at the provider
pub fn missing_hostnames(
    config: &DdnsConfig,
    records: &[ManagedRecord],
    decision: &Decision,
) -> Vec<(String, AddressFamily)> {
    let mut missing = Vec::new();

    for hostname in &config.records {
        for family in &decision.families {
            let found = records
                .iter()
                .any(|r| r.family == *family && r.name.eq_ignore_ascii_case(hostname));
            if !found {
                debug!("No {} record found for {}", family.record_type(), hostname);
                missing.push((hostname.clone(), *family));
            }
        }
    }

    missing
}
