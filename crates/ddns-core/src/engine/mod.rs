//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Resolving the public address of each enabled family
//! - Deciding, against the persisted state, whether an update is warranted
//! - Updating the managed DNS records via DnsProvider
//! - Persisting the new state and announcing the outcome
//!
//! ## Architecture
//!
//! ```text
//!  ┌─────────────────┐        ┌──────────────┐
//!  │ AddressResolver │─ v4 ──▶│              │
//!  │                 │─ v6 ──▶│  DdnsEngine  │
//!  └─────────────────┘        └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │ StateStore  │           │ DnsProvider  │           │  Notifier   │
//! │ (load/save) │           │ (list/patch) │           │  (alert)    │
//! └─────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! RESOLVING → DECIDING → UPDATING → PERSISTING → DONE | FAILED
//!
//! 1. Resolve every enabled family concurrently
//! 2. Compare against the last-known addresses of the snapshot
//! 3. If changed, forced or first run: verify the credential, list zones and
//!    records, and patch every stale managed record concurrently
//! 4. Write the new state in one atomic save
//! 5. Notify on change, force or failure
//!
//! Cycles never overlap: [`DdnsEngine::run`] waits for a cycle to finish
//! before sleeping for the configured interval.

mod plan;
mod report;

pub use plan::{Decision, decide, missing_hostnames, plan_updates};
pub use report::{CycleKind, CycleReport, FailedUpdate, RecordChange, ResolvedAddresses};

use futures::future::join_all;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{DEFAULT_INTERVAL_SECS, DdnsConfig};
use crate::error::{Error, Result};
use crate::state::DdnsDocument;
use crate::traits::{
    AddressFamily, AddressResolver, DnsProvider, ManagedRecord, Notification, Notifier, Priority,
    ResolvedAddress, StateStore,
};

/// Default capacity of the engine event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 100;

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Scheduler loop started
    Started,

    /// A cycle began
    CycleStarted { forced: bool },

    /// A family resolved
    AddressResolved {
        family: AddressFamily,
        address: IpAddr,
        source: String,
    },

    /// A record was patched
    RecordUpdated {
        hostname: String,
        family: AddressFamily,
        content: IpAddr,
    },

    /// A record patch failed
    RecordUpdateFailed {
        hostname: String,
        family: AddressFamily,
        error: String,
    },

    /// A cycle finished and its state was handed to the store
    CycleCompleted {
        kind: CycleKind,
        updated: usize,
        failed: usize,
    },

    /// A cycle aborted
    CycleFailed { error: String },

    /// Scheduler loop stopped
    Stopped { reason: String },
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Either call [`DdnsEngine::run_cycle()`] once (one-shot update) or
///    [`DdnsEngine::run()`] for the fixed-interval loop
/// 3. Drop to cleanup
///
/// ## Single Writer
///
/// The engine is the only writer of the reconciliation state. It reads an
/// immutable snapshot at the start of each cycle and replaces it with a new
/// document at the end; running two engines against the same store needs an
/// external single-instance guard.
pub struct DdnsEngine {
    /// Public address discovery
    resolver: Box<dyn AddressResolver>,

    /// DNS provider for listing and updating records
    provider: Box<dyn DnsProvider>,

    /// Settings and reconciliation state
    state_store: Box<dyn StateStore>,

    /// Alert sink
    notifier: Box<dyn Notifier>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Box<dyn AddressResolver>,
        provider: Box<dyn DnsProvider>,
        state_store: Box<dyn StateStore>,
        notifier: Box<dyn Notifier>,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        Self::with_event_capacity(
            resolver,
            provider,
            state_store,
            notifier,
            DEFAULT_EVENT_CHANNEL_CAPACITY,
        )
    }

    /// Create a new DDNS engine with a custom event channel capacity
    pub fn with_event_capacity(
        resolver: Box<dyn AddressResolver>,
        provider: Box<dyn DnsProvider>,
        state_store: Box<dyn StateStore>,
        notifier: Box<dyn Notifier>,
        event_channel_capacity: usize,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(event_channel_capacity.max(1));

        let engine = Self {
            resolver,
            provider,
            state_store,
            notifier,
            event_tx: tx,
        };

        (engine, rx)
    }

    /// Run one cycle
    ///
    /// # Parameters
    ///
    /// - `force`: Write every managed record even if nothing changed
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle completed (possibly with individual
    ///   record failures, listed in the report)
    /// - `Err(Error)`: The cycle aborted; the error was already notified and
    ///   recorded as the status message
    pub async fn run_cycle(&self, force: bool) -> Result<CycleReport> {
        let span = info_span!("cycle", forced = force);
        self.execute_cycle(force).instrument(span).await
    }

    async fn execute_cycle(&self, force: bool) -> Result<CycleReport> {
        self.emit_event(EngineEvent::CycleStarted { forced: force });

        let document = match self.load_snapshot().await {
            Ok(document) => document,
            Err(e) => {
                error!("Error during update: {}", e);
                self.notify_failure(&e).await;
                self.emit_event(EngineEvent::CycleFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        // A document that loads but fails validation still gets its status
        let outcome = match document.config.validate() {
            Ok(()) => self.reconcile(&document, force).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => Ok(self.finish(document, report).await),
            Err(e) => {
                self.record_failure(&document, &e).await;
                Err(e)
            }
        }
    }

    /// Load the snapshot this cycle works from
    async fn load_snapshot(&self) -> Result<DdnsDocument> {
        self.state_store.load().await?.ok_or_else(|| {
            Error::config("Configuration not found. Please run the setup first.")
        })
    }

    /// RESOLVING, DECIDING and UPDATING
    async fn reconcile(&self, document: &DdnsDocument, force: bool) -> Result<CycleReport> {
        let config = &document.config;

        // RESOLVING
        let resolved = self.resolve_enabled(config).await;
        info!(
            "Detected IPv4: {}, IPv6: {}",
            resolved
                .get(AddressFamily::V4)
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "null".to_string()),
            resolved
                .get(AddressFamily::V6)
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "null".to_string()),
        );

        // DECIDING
        let decision = decide(config, &document.state.last_known_ip, &resolved, force);
        let mut report = CycleReport::new(decision.kind, force, resolved);

        if !decision.warrants_update() {
            if decision.kind == CycleKind::Unresolved {
                warn!("No public address could be resolved, skipping update");
            } else {
                info!("IPs unchanged.");
            }
            return Ok(report);
        }

        if decision.kind == CycleKind::Forced {
            info!("Force update triggered. Updating DNS records...");
        } else {
            info!("IP Address changed. Updating DNS records...");
        }

        // UPDATING
        if !self.provider.verify_credential().await {
            return Err(Error::credential_invalid(format!(
                "{} rejected the API token or reported it inactive",
                self.provider.provider_name()
            )));
        }

        let records = self.list_all_records().await?;
        for (hostname, family) in missing_hostnames(config, &records, &decision) {
            warn!(
                "No {} record found for managed hostname {}",
                family.record_type(),
                hostname
            );
        }

        let planned = plan_updates(config, &records, &report.resolved, &decision, force);
        self.apply_updates(planned, &mut report).await;

        report.finished_at = chrono::Utc::now();
        Ok(report)
    }

    /// Resolve every enabled family concurrently
    async fn resolve_enabled(&self, config: &DdnsConfig) -> ResolvedAddresses {
        let (v4, v6) = tokio::join!(
            self.resolve_family(config, AddressFamily::V4),
            self.resolve_family(config, AddressFamily::V6),
        );
        ResolvedAddresses { v4, v6 }
    }

    async fn resolve_family(
        &self,
        config: &DdnsConfig,
        family: AddressFamily,
    ) -> Option<ResolvedAddress> {
        if !config.is_enabled(family) {
            debug!("{} is disabled, not resolving", family);
            return None;
        }

        let resolved = self.resolver.resolve(family).await?;
        if resolved.family != family {
            warn!(
                "Resolver answered {} with a {} address, ignoring",
                family, resolved.family
            );
            return None;
        }

        self.emit_event(EngineEvent::AddressResolved {
            family,
            address: resolved.address,
            source: resolved.source.clone(),
        });
        Some(resolved)
    }

    /// List the A/AAAA records of every zone
    ///
    /// Zones are listed concurrently; any listing failure aborts the cycle.
    async fn list_all_records(&self) -> Result<Vec<ManagedRecord>> {
        let zones = self.provider.list_zones().await?;
        debug!("Found {} zone(s)", zones.len());

        let listings = join_all(
            zones
                .iter()
                .map(|zone| self.provider.list_managed_records(&zone.id)),
        )
        .await;

        let mut records = Vec::new();
        for listing in listings {
            records.extend(listing?);
        }
        Ok(records)
    }

    /// Issue every planned update concurrently and await all of them
    async fn apply_updates(&self, planned: Vec<(ManagedRecord, IpAddr)>, report: &mut CycleReport) {
        let results = join_all(planned.into_iter().map(|(record, address)| async move {
            let content = address.to_string();
            let result = self.provider.update_record(&record, &content).await;
            (record, address, result)
        }))
        .await;

        for (record, address, result) in results {
            match result {
                Ok(()) => {
                    self.emit_event(EngineEvent::RecordUpdated {
                        hostname: record.name.clone(),
                        family: record.family,
                        content: address,
                    });
                    report.updated.push(RecordChange {
                        hostname: record.name,
                        family: record.family,
                        previous_content: record.content,
                        new_content: address,
                    });
                }
                Err(e) => {
                    error!(
                        "Failed to update record {} ({}): {}",
                        record.name,
                        record.family.record_type(),
                        e
                    );
                    self.emit_event(EngineEvent::RecordUpdateFailed {
                        hostname: record.name.clone(),
                        family: record.family,
                        error: e.to_string(),
                    });
                    report.failed.push(FailedUpdate {
                        hostname: record.name,
                        family: record.family,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// PERSISTING and announcement of a completed cycle
    async fn finish(&self, document: DdnsDocument, mut report: CycleReport) -> CycleReport {
        let next_state = report.next_state(&document.state);
        let next = document.with_state(next_state);

        if let Err(e) = self.state_store.save(&next).await {
            error!("Failed to persist cycle state: {}", e);
            report.persistence_error = Some(e.to_string());
        }

        if report.is_clean() {
            match report.kind {
                CycleKind::Changed | CycleKind::Forced => info!(
                    "Update completed: {} record(s) updated.",
                    report.updated.len()
                ),
                _ => debug!("Cycle completed: {:?}", report.kind),
            }
        } else {
            warn!("Cycle completed with errors: {}", report.status_message());
        }

        if let Some(notification) = report.notification() {
            self.notifier.notify(notification).await;
        }

        self.emit_event(EngineEvent::CycleCompleted {
            kind: report.kind,
            updated: report.updated.len(),
            failed: report.failed.len(),
        });

        report
    }

    /// Failure path: alert, then record the error as the status message
    async fn record_failure(&self, document: &DdnsDocument, error: &Error) {
        error!("Error during update: {}", error);
        self.notify_failure(error).await;

        let mut failed = document.clone();
        failed.state.last_message = Some(format!("Error: {}", error));
        if let Err(save_err) = self.state_store.save(&failed).await {
            error!("Failed to save error state: {}", save_err);
        }

        self.emit_event(EngineEvent::CycleFailed {
            error: error.to_string(),
        });
    }

    async fn notify_failure(&self, error: &Error) {
        self.notifier
            .notify(Notification::new(
                "DDNS Error",
                error.to_string(),
                Priority::High,
            ))
            .await;
    }

    /// Delay before the next scheduled cycle, taken from the current settings
    async fn next_delay(&self) -> Duration {
        match self.state_store.load().await {
            Ok(Some(document)) => document.config.interval(),
            Ok(None) => Duration::from_secs(DEFAULT_INTERVAL_SECS),
            Err(e) => {
                warn!("Could not read interval, using default: {}", e);
                Duration::from_secs(DEFAULT_INTERVAL_SECS)
            }
        }
    }

    /// Run the scheduler loop
    ///
    /// Runs a cycle, waits the configured interval after it completes, and
    /// repeats until SIGINT. A failed cycle is logged and the schedule
    /// continues; the next cycle is the retry.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(EngineEvent::Started);

        let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send + '_>> = match shutdown_rx {
            // Test mode: wait for provided shutdown signal
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            // Production mode: wait for SIGINT
            None => Box::pin(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                    std::future::pending::<()>().await;
                }
            }),
        };

        loop {
            // A cycle always runs to completion before shutdown is observed
            if let Err(e) = self.run_cycle(false).await {
                error!("Cycle failed, will retry on next tick: {}", e);
            }

            let delay = self.next_delay().await;
            debug!("Next check in {:?}", delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        info!("Engine stopped");

        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging warning if channel is full (backpressure)
        if let Err(e) = self.event_tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Event channel full, dropping event");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    debug!("Event channel closed, dropping event");
                }
            }
        }
    }

    /// Run the scheduler loop until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Used by tests and by hosts that listen for more than SIGINT; `None`
    /// behaves like [`DdnsEngine::run()`].
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}
