//! Contract Test: Reconciliation Cycle
//!
//! Constraints verified:
//! - A changed address is written to every stale managed record
//! - A forced cycle writes every managed record of every resolved family
//! - One failing record update does not stop its siblings
//! - A rejected credential aborts the cycle before any record is touched
//! - Record-listing failures abort the cycle
//! - An invalid configuration is recorded as the status message
//! - Family resolutions and record updates run concurrently
//!
//! If this test fails, DNS records can drift from the detected address.

mod common;

use common::*;
use ddns_core::engine::{CycleKind, EngineEvent};
use ddns_core::state::MemoryStateStore;
use ddns_core::traits::{AddressFamily, Priority};
use ddns_core::{DdnsDocument, DdnsEngine, Error};
use std::time::Duration;
use tokio::time::timeout;

struct Harness {
    resolver: ScriptedResolver,
    provider: RecordingProvider,
    store: MemoryStateStore,
    notifier: RecordingNotifier,
}

impl Harness {
    fn new(resolver: ScriptedResolver, provider: RecordingProvider, document: DdnsDocument) -> Self {
        Self {
            resolver,
            provider,
            store: MemoryStateStore::with_document(document),
            notifier: RecordingNotifier::new(),
        }
    }

    fn engine(&self) -> (DdnsEngine, tokio::sync::mpsc::Receiver<EngineEvent>) {
        DdnsEngine::new(
            Box::new(ScriptedResolver::sharing_counters_with(&self.resolver)),
            Box::new(RecordingProvider::sharing_counters_with(&self.provider)),
            Box::new(self.store.clone()),
            Box::new(RecordingNotifier::sharing_counters_with(&self.notifier)),
        )
    }
}

#[tokio::test]
async fn changed_v4_address_updates_stale_record() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.2"), Some("2001:db8::1")),
        RecordingProvider::new()
            .with_record("home.example.com", AddressFamily::V4, "203.0.113.1")
            .with_record("home.example.com", AddressFamily::V6, "2001:db8::1"),
        document_with_last_known(
            minimal_config(&["home.example.com"]),
            Some("203.0.113.1"),
            Some("2001:db8::1"),
        ),
    );
    let (engine, mut event_rx) = harness.engine();

    let report = engine.run_cycle(false).await.expect("cycle succeeds");

    assert_eq!(report.kind, CycleKind::Changed);
    assert_eq!(
        harness.provider.updates(),
        vec![(
            "home.example.com".to_string(),
            AddressFamily::V4,
            "203.0.113.2".to_string()
        )],
        "Only the stale A record is written"
    );
    assert_eq!(
        harness
            .provider
            .content_of("home.example.com", AddressFamily::V4)
            .as_deref(),
        Some("203.0.113.2")
    );

    let doc = harness.store.snapshot().await.unwrap();
    assert_eq!(doc.state.last_known_ip.get(AddressFamily::V4), Some(ip("203.0.113.2")));
    assert_eq!(doc.state.last_known_ip.get(AddressFamily::V6), Some(ip("2001:db8::1")));

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "IP Address Changed");
    assert_eq!(sent[0].priority, Priority::High);
    assert!(sent[0].message.contains("home.example.com"));
    assert!(sent[0].message.contains("203.0.113.2"));

    let mut saw_update = false;
    while let Ok(event) = event_rx.try_recv() {
        if let EngineEvent::RecordUpdated { hostname, content, .. } = event {
            assert_eq!(hostname, "home.example.com");
            assert_eq!(content, ip("203.0.113.2"));
            saw_update = true;
        }
    }
    assert!(saw_update, "RecordUpdated event must be emitted");
}

#[tokio::test]
async fn forced_cycle_writes_every_managed_record() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.1"), Some("2001:db8::1")),
        RecordingProvider::new()
            .with_record("home.example.com", AddressFamily::V4, "203.0.113.1")
            .with_record("home.example.com", AddressFamily::V6, "2001:db8::1")
            .with_record("vpn.example.com", AddressFamily::V4, "203.0.113.1")
            .with_record("unmanaged.example.com", AddressFamily::V4, "198.51.100.9"),
        document_with_last_known(
            minimal_config(&["home.example.com", "vpn.example.com"]),
            Some("203.0.113.1"),
            Some("2001:db8::1"),
        ),
    );
    let (engine, _event_rx) = harness.engine();

    let report = engine.run_cycle(true).await.expect("forced cycle succeeds");

    assert_eq!(report.kind, CycleKind::Forced);
    assert_eq!(report.updated.len(), 3);
    assert_eq!(harness.provider.update_call_count(), 3);
    assert!(
        harness
            .provider
            .updates()
            .iter()
            .all(|(name, _, _)| name != "unmanaged.example.com"),
        "Records outside the managed set are never written"
    );

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Force Update Completed");
    assert_eq!(sent[0].priority, Priority::Default);

    let doc = harness.store.snapshot().await.unwrap();
    assert_eq!(
        doc.state.last_message.as_deref(),
        Some("Force update completed successfully.")
    );
}

#[tokio::test]
async fn failing_update_does_not_block_siblings() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.2"), None),
        RecordingProvider::new()
            .with_record("home.example.com", AddressFamily::V4, "203.0.113.1")
            .with_record("vpn.example.com", AddressFamily::V4, "203.0.113.1"),
        document_with_last_known(
            minimal_config(&["home.example.com", "vpn.example.com"]),
            Some("203.0.113.1"),
            None,
        ),
    );
    harness.provider.fail_updates_for("vpn.example.com");
    let (engine, _event_rx) = harness.engine();

    let report = engine.run_cycle(false).await.expect("cycle completes");

    assert_eq!(harness.provider.update_call_count(), 2, "both updates attempted");
    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.updated[0].hostname, "home.example.com");
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].hostname, "vpn.example.com");
    assert!(!report.is_clean());

    let doc = harness.store.snapshot().await.unwrap();
    assert_eq!(
        doc.state.last_known_ip.get(AddressFamily::V4),
        Some(ip("203.0.113.1")),
        "A family with a failed update keeps its previous value so the next cycle retries"
    );
    assert!(doc.state.last_message.unwrap().starts_with("Error"));

    // Next cycle retries; this time the provider accepts it
    harness.provider.clear_failing_updates();
    let retry = engine.run_cycle(false).await.expect("retry succeeds");

    assert_eq!(retry.kind, CycleKind::Changed);
    assert_eq!(retry.updated.len(), 1, "the already-updated record is skipped");
    assert_eq!(retry.updated[0].hostname, "vpn.example.com");
    assert!(retry.is_clean());
}

#[tokio::test]
async fn invalid_credential_aborts_before_records_are_touched() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.2"), None),
        RecordingProvider::new().with_record("home.example.com", AddressFamily::V4, "203.0.113.1"),
        document_with_last_known(
            minimal_config(&["home.example.com"]),
            Some("203.0.113.1"),
            None,
        ),
    );
    harness.provider.set_credential_valid(false);
    let (engine, _event_rx) = harness.engine();

    let err = engine.run_cycle(false).await.unwrap_err();

    assert!(matches!(err, Error::CredentialInvalid(_)), "got {:?}", err);
    assert_eq!(harness.provider.list_call_count(), 0);
    assert_eq!(harness.provider.update_call_count(), 0);

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "DDNS Error");
    assert_eq!(sent[0].priority, Priority::High);

    let doc = harness.store.snapshot().await.unwrap();
    assert!(doc.state.last_message.unwrap().starts_with("Error: Credential invalid"));
    assert_eq!(
        doc.state.last_known_ip.get(AddressFamily::V4),
        Some(ip("203.0.113.1")),
        "An aborted cycle does not advance last-known addresses"
    );
    assert!(doc.state.last_success.is_none());
}

#[tokio::test]
async fn listing_failure_aborts_cycle() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.2"), None),
        RecordingProvider::new().with_record("home.example.com", AddressFamily::V4, "203.0.113.1"),
        DdnsDocument::new(minimal_config(&["home.example.com"])),
    );
    harness.provider.set_listing_fails(true);
    let (engine, _event_rx) = harness.engine();

    let err = engine.run_cycle(false).await.unwrap_err();

    assert!(matches!(err, Error::Provider { .. }), "got {:?}", err);
    assert_eq!(harness.provider.update_call_count(), 0);
    let doc = harness.store.snapshot().await.unwrap();
    assert_eq!(doc.state.last_known_ip.get(AddressFamily::V4), None);
}

#[tokio::test]
async fn missing_document_is_a_configuration_error() {
    let notifier = RecordingNotifier::new();
    let (engine, _event_rx) = DdnsEngine::new(
        Box::new(ScriptedResolver::new(Some("203.0.113.2"), None)),
        Box::new(RecordingProvider::new()),
        Box::new(MemoryStateStore::new()),
        Box::new(RecordingNotifier::sharing_counters_with(&notifier)),
    );

    let err = engine.run_cycle(false).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn invalid_configuration_is_recorded_as_status() {
    let mut document = document_with_last_known(
        minimal_config(&["home.example.com"]),
        Some("203.0.113.1"),
        None,
    );
    document.config.interval_secs = 5;
    document.state.last_message = Some("Service is running normally.".to_string());

    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.2"), None),
        RecordingProvider::new().with_record("home.example.com", AddressFamily::V4, "203.0.113.1"),
        document,
    );
    let (engine, _event_rx) = harness.engine();

    let err = engine.run_cycle(false).await.unwrap_err();

    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
    assert_eq!(harness.resolver.resolve_call_count(), 0);
    assert_eq!(harness.provider.update_call_count(), 0);

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].priority, Priority::High);

    let doc = harness.store.snapshot().await.unwrap();
    assert!(
        doc.state
            .last_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Error: Configuration error")),
        "got {:?}",
        doc.state.last_message
    );
    assert_eq!(doc.config.interval_secs, 5, "the user's settings are kept as written");
    assert_eq!(doc.state.last_known_ip.get(AddressFamily::V4), Some(ip("203.0.113.1")));
}

#[tokio::test]
async fn wildcard_hostname_is_managed() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.2"), None),
        RecordingProvider::new()
            .with_record("*.example.com", AddressFamily::V4, "203.0.113.1")
            .with_record("home.example.com", AddressFamily::V4, "203.0.113.1"),
        document_with_last_known(
            minimal_config(&["*.example.com", "home.example.com"]),
            Some("203.0.113.1"),
            None,
        ),
    );
    let (engine, _event_rx) = harness.engine();

    let report = engine.run_cycle(false).await.expect("cycle succeeds");

    assert_eq!(report.updated.len(), 2);
    assert_eq!(
        harness
            .provider
            .content_of("*.example.com", AddressFamily::V4)
            .as_deref(),
        Some("203.0.113.2")
    );
}

#[tokio::test]
async fn record_updates_run_concurrently() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.1"), Some("2001:db8::1")),
        RecordingProvider::new()
            .with_record("home.example.com", AddressFamily::V4, "203.0.113.1")
            .with_record("home.example.com", AddressFamily::V6, "2001:db8::1")
            .with_record("vpn.example.com", AddressFamily::V4, "203.0.113.1"),
        document_with_last_known(
            minimal_config(&["home.example.com", "vpn.example.com"]),
            Some("203.0.113.1"),
            Some("2001:db8::1"),
        ),
    );
    // Each update blocks until all three are in flight
    harness.provider.gate_updates(3);
    let (engine, _event_rx) = harness.engine();

    let report = timeout(Duration::from_secs(5), engine.run_cycle(true))
        .await
        .expect("updates must overlap, a serial pass never gets past the first")
        .expect("forced cycle succeeds");

    assert_eq!(report.updated.len(), 3);
}

#[tokio::test]
async fn family_resolutions_run_concurrently() {
    let harness = Harness::new(
        ScriptedResolver::new(Some("203.0.113.1"), Some("2001:db8::1")),
        RecordingProvider::new(),
        document_with_last_known(
            minimal_config(&["home.example.com"]),
            Some("203.0.113.1"),
            Some("2001:db8::1"),
        ),
    );
    harness.resolver.gate_resolutions(2);
    let (engine, _event_rx) = harness.engine();

    let report = timeout(Duration::from_secs(5), engine.run_cycle(false))
        .await
        .expect("both families must resolve at the same time")
        .expect("cycle succeeds");

    assert_eq!(report.kind, CycleKind::NoChange);
    assert_eq!(harness.resolver.resolve_call_count(), 2);
}
