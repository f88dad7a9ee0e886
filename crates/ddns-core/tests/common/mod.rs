//! Test doubles and common utilities for engine contract tests
//!
//! Every double keeps its observable state behind `Arc`s so a test can hand
//! one copy to the engine (which takes ownership) and keep another for
//! assertions via `sharing_counters_with`.

#![allow(dead_code)]

use ddns_core::config::DdnsConfig;
use ddns_core::error::{Error, Result};
use ddns_core::state::DdnsDocument;
use ddns_core::traits::{
    AddressFamily, AddressResolver, DnsProvider, ManagedRecord, Notification, Notifier,
    ResolvedAddress, Zone,
};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

pub const ZONE_ID: &str = "zone-1";

pub fn ip(text: &str) -> IpAddr {
    text.parse().expect("valid test address")
}

/// A resolver whose answers are set by the test
pub struct ScriptedResolver {
    answers: Arc<Mutex<HashMap<AddressFamily, IpAddr>>>,
    resolve_call_count: Arc<AtomicUsize>,
    barrier: Arc<Mutex<Option<Arc<Barrier>>>>,
}

impl ScriptedResolver {
    pub fn new(v4: Option<&str>, v6: Option<&str>) -> Self {
        let resolver = Self {
            answers: Arc::new(Mutex::new(HashMap::new())),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
            barrier: Arc::new(Mutex::new(None)),
        };
        resolver.set(AddressFamily::V4, v4);
        resolver.set(AddressFamily::V6, v6);
        resolver
    }

    /// Change what `family` resolves to; `None` makes it fail
    pub fn set(&self, family: AddressFamily, address: Option<&str>) {
        let mut answers = self.answers.lock().unwrap();
        match address {
            Some(address) => {
                answers.insert(family, ip(address));
            }
            None => {
                answers.remove(&family);
            }
        }
    }

    /// Make every resolution wait until `parties` resolutions are in flight
    pub fn gate_resolutions(&self, parties: usize) {
        *self.barrier.lock().unwrap() = Some(Arc::new(Barrier::new(parties)));
    }

    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            answers: Arc::clone(&other.answers),
            resolve_call_count: Arc::clone(&other.resolve_call_count),
            barrier: Arc::clone(&other.barrier),
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for ScriptedResolver {
    async fn resolve(&self, family: AddressFamily) -> Option<ResolvedAddress> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        let barrier = self.barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        let address = self.answers.lock().unwrap().get(&family).copied()?;
        Some(ResolvedAddress::new(address, format!("scripted-{}", family.record_type())))
    }
}

/// A provider backed by an in-memory record set
///
/// Updates mutate the stored record content, so a later listing reflects
/// earlier writes the way the real API does.
pub struct RecordingProvider {
    records: Arc<Mutex<Vec<ManagedRecord>>>,
    credential_valid: Arc<AtomicBool>,
    listing_fails: Arc<AtomicBool>,
    failing_hostnames: Arc<Mutex<HashSet<String>>>,
    updates: Arc<Mutex<Vec<(String, AddressFamily, String)>>>,
    verify_call_count: Arc<AtomicUsize>,
    list_call_count: Arc<AtomicUsize>,
    update_barrier: Arc<Mutex<Option<Arc<Barrier>>>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            credential_valid: Arc::new(AtomicBool::new(true)),
            listing_fails: Arc::new(AtomicBool::new(false)),
            failing_hostnames: Arc::new(Mutex::new(HashSet::new())),
            updates: Arc::new(Mutex::new(Vec::new())),
            verify_call_count: Arc::new(AtomicUsize::new(0)),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            update_barrier: Arc::new(Mutex::new(None)),
        }
    }

    /// Add an existing record at the provider
    pub fn with_record(self, hostname: &str, family: AddressFamily, content: &str) -> Self {
        {
            let mut records = self.records.lock().unwrap();
            let id = format!("rec-{}", records.len() + 1);
            records.push(ManagedRecord {
                id,
                zone_id: ZONE_ID.to_string(),
                name: hostname.to_string(),
                family,
                content: content.to_string(),
                proxied: false,
            });
        }
        self
    }

    pub fn set_credential_valid(&self, valid: bool) {
        self.credential_valid.store(valid, Ordering::SeqCst);
    }

    pub fn set_listing_fails(&self, fails: bool) {
        self.listing_fails.store(fails, Ordering::SeqCst);
    }

    /// Make every update of `hostname` fail
    pub fn fail_updates_for(&self, hostname: &str) {
        self.failing_hostnames
            .lock()
            .unwrap()
            .insert(hostname.to_string());
    }

    /// Make every update wait until `parties` updates are in flight
    pub fn gate_updates(&self, parties: usize) {
        *self.update_barrier.lock().unwrap() = Some(Arc::new(Barrier::new(parties)));
    }

    pub fn clear_failing_updates(&self) {
        self.failing_hostnames.lock().unwrap().clear();
    }

    /// Successful and failed update attempts, in completion order
    pub fn updates(&self) -> Vec<(String, AddressFamily, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn update_call_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn verify_call_count(&self) -> usize {
        self.verify_call_count.load(Ordering::SeqCst)
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    /// Current content of a record
    pub fn content_of(&self, hostname: &str, family: AddressFamily) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name == hostname && r.family == family)
            .map(|r| r.content.clone())
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            records: Arc::clone(&other.records),
            credential_valid: Arc::clone(&other.credential_valid),
            listing_fails: Arc::clone(&other.listing_fails),
            failing_hostnames: Arc::clone(&other.failing_hostnames),
            updates: Arc::clone(&other.updates),
            verify_call_count: Arc::clone(&other.verify_call_count),
            list_call_count: Arc::clone(&other.list_call_count),
            update_barrier: Arc::clone(&other.update_barrier),
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn verify_credential(&self) -> bool {
        self.verify_call_count.fetch_add(1, Ordering::SeqCst);
        self.credential_valid.load(Ordering::SeqCst)
    }

    async fn list_zones(&self) -> Result<Vec<Zone>> {
        Ok(vec![Zone {
            id: ZONE_ID.to_string(),
            name: "example.com".to_string(),
            status: "active".to_string(),
        }])
    }

    async fn list_managed_records(&self, zone_id: &str) -> Result<Vec<ManagedRecord>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(Error::provider("test", "listing unavailable"));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.zone_id == zone_id)
            .cloned()
            .collect())
    }

    async fn update_record(&self, record: &ManagedRecord, content: &str) -> Result<()> {
        let barrier = self.update_barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }

        self.updates.lock().unwrap().push((
            record.name.clone(),
            record.family,
            content.to_string(),
        ));

        if self.failing_hostnames.lock().unwrap().contains(&record.name) {
            return Err(Error::provider("test", "rate limited"));
        }

        let mut records = self.records.lock().unwrap();
        if let Some(stored) = records.iter_mut().find(|r| r.id == record.id) {
            stored.content = content.to_string();
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "test"
    }
}

/// A notifier that keeps every notification
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            sent: Arc::clone(&other.sent),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// Helper to create a minimal valid DdnsConfig for testing
pub fn minimal_config(records: &[&str]) -> DdnsConfig {
    DdnsConfig::new(
        "cf-test-token-0123456789",
        records.iter().map(|r| r.to_string()).collect(),
    )
    .with_interval_secs(10)
}

/// A document whose last-known addresses are already set
pub fn document_with_last_known(
    config: DdnsConfig,
    v4: Option<&str>,
    v6: Option<&str>,
) -> DdnsDocument {
    let mut doc = DdnsDocument::new(config);
    doc.state.last_known_ip.v4 = v4.map(ip);
    doc.state.last_known_ip.v6 = v6.map(ip);
    doc
}
