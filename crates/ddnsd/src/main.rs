// # ddnsd - DDNS Daemon
//
// Thin command surface over ddns-core. All DDNS logic lives in the library
// crates; this binary only:
// 1. Parses the command line
// 2. Initializes logging and the runtime
// 3. Wires the HTTP resolver, Cloudflare provider, ntfy notifier and file
//    store into a DdnsEngine
// 4. Runs one cycle, the scheduler loop, or a read-only command
//
// ## Commands
//
// - `update [--force]`: run one cycle
// - `run`: run cycles every `interval` seconds until SIGINT/SIGTERM
// - `status`: show the last recorded outcome and health
// - `config`: show the configuration with secrets masked
// - `test-notify`: send a test notification
//
// ## Environment
//
// - `DDNS_CONFIG_PATH`: configuration file (default
//   `$HOME/.config/cloudflare-ddns/config.json`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `DDNS_RESOLVER_TIMEOUT_MS`: per-endpoint resolver timeout
// - `DDNS_MODE=dry-run`: list records but never write them
//
// ## Example
//
// ```bash
// ddnsd --config /etc/ddns/config.json update --force
// DDNS_MODE=dry-run ddnsd run
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use ddns_core::traits::{NoopNotifier, Notification, Notifier, Priority, StateStore};
use ddns_core::{DdnsDocument, DdnsEngine, FileStateStore, StatusReport};
use ddns_ip_http::{DEFAULT_TIMEOUT_MS, HttpAddressResolver};
use ddns_notify_ntfy::NtfyNotifier;
use ddns_provider_cloudflare::CloudflareProvider;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Directory under `$HOME` holding the default configuration file
const DEFAULT_CONFIG_DIR: &str = ".config/cloudflare-ddns";

/// Default configuration file name
const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown / success
/// - 1: Configuration or startup error
/// - 2: Runtime error (failed cycle, failed delivery)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Parser, Debug)]
#[command(name = "ddnsd")]
#[command(about = "Dynamic DNS updater for Cloudflare", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "DDNS_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "DDNS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Per-endpoint timeout of the address resolver, in milliseconds
    #[arg(long, global = true, env = "DDNS_RESOLVER_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    resolver_timeout_ms: u64,

    /// List records but never write them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one update cycle
    Update {
        /// Write every managed record even if the address is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Run update cycles on the configured interval until interrupted
    Run,
    /// Show the last recorded outcome
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the configuration with secrets masked
    Config,
    /// Send a test notification
    TestNotify,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!(
                "Configuration error: log level '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            );
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match dispatch(&cli).await {
            Ok(code) => code,
            Err(e) => {
                error!("{:#}", e);
                exit_code_for(&e)
            }
        }
    });

    result.into()
}

/// Map an error that escaped a command to its exit code
fn exit_code_for(err: &anyhow::Error) -> DdnsExitCode {
    match err.downcast_ref::<ddns_core::Error>() {
        Some(ddns_core::Error::Config(_)) => DdnsExitCode::ConfigError,
        _ => DdnsExitCode::RuntimeError,
    }
}

async fn dispatch(cli: &Cli) -> Result<DdnsExitCode> {
    let path = config_path(cli.config.clone())?;
    debug!("Using configuration file {}", path.display());
    let store = FileStateStore::new(&path).await?;

    match &cli.command {
        Command::Update { force } => update_once(cli, store, *force).await,
        Command::Run => run_daemon(cli, store).await,
        Command::Status { json } => show_status(&store, *json).await,
        Command::Config => show_config(&store).await,
        Command::TestNotify => test_notify(&store).await,
    }
}

/// Resolve the configuration file location
fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let home = env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .ok_or_else(|| ddns_core::Error::config("HOME is not set; pass --config <PATH>"))?;

    Ok(PathBuf::from(home)
        .join(DEFAULT_CONFIG_DIR)
        .join(DEFAULT_CONFIG_FILE))
}

/// Load the document, treating a missing file as a configuration error
async fn load_document(store: &FileStateStore) -> Result<DdnsDocument> {
    store.load().await?.ok_or_else(|| {
        ddns_core::Error::config(format!(
            "Configuration not found at {}. Please run the setup first.",
            store.path().display()
        ))
        .into()
    })
}

/// Wire the collaborators from the loaded settings
async fn build_engine(
    cli: &Cli,
    store: FileStateStore,
) -> Result<(DdnsEngine, tokio::sync::mpsc::Receiver<ddns_core::EngineEvent>)> {
    let document = load_document(&store).await?;
    document.config.validate()?;

    // Check for dry-run mode environment variable
    let dry_run = cli.dry_run
        || env::var("DDNS_MODE").unwrap_or_default().to_lowercase() == "dry-run";

    let resolver = HttpAddressResolver::new()
        .with_timeout(Duration::from_millis(cli.resolver_timeout_ms));

    let provider = CloudflareProvider::new(document.config.api_token.clone(), dry_run)
        .context("Failed to create Cloudflare provider")?;

    let notifier: Box<dyn Notifier> = match NtfyNotifier::from_config(&document.config.notifications)? {
        Some(ntfy) => {
            info!("Notifications enabled: {}", ntfy.target());
            Box::new(ntfy)
        }
        None => Box::new(NoopNotifier),
    };

    info!(
        "Managing {} record(s): {}",
        document.config.records.len(),
        document.config.records.join(", ")
    );

    Ok(DdnsEngine::new(
        Box::new(resolver),
        Box::new(provider),
        Box::new(store),
        notifier,
    ))
}

/// `update [--force]`
async fn update_once(cli: &Cli, store: FileStateStore, force: bool) -> Result<DdnsExitCode> {
    let (engine, events) = build_engine(cli, store).await?;
    drop(events);

    let report = engine.run_cycle(force).await?;

    if let Some(e) = &report.persistence_error {
        error!("Cycle result was not saved: {}", e);
        return Ok(DdnsExitCode::RuntimeError);
    }

    if report.is_clean() {
        info!("{}", report.status_message());
        Ok(DdnsExitCode::CleanShutdown)
    } else {
        error!("{}", report.status_message());
        Ok(DdnsExitCode::RuntimeError)
    }
}

/// `run`
async fn run_daemon(cli: &Cli, store: FileStateStore) -> Result<DdnsExitCode> {
    let (engine, mut events) = build_engine(cli, store).await?;

    info!("Starting ddnsd daemon");

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;

    info!("Shutting down daemon");
    Ok(DdnsExitCode::CleanShutdown)
}

/// `status`
async fn show_status(store: &FileStateStore, json: bool) -> Result<DdnsExitCode> {
    let document = load_document(store).await?;
    let report = StatusReport::from_document(&document, chrono::Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(DdnsExitCode::CleanShutdown);
    }

    let unknown = || "Unknown".to_string();
    println!("IPv4:        {}", report.ipv4.map(|ip| ip.to_string()).unwrap_or_else(unknown));
    println!("IPv6:        {}", report.ipv6.map(|ip| ip.to_string()).unwrap_or_else(unknown));
    println!(
        "Last Update: {}{}",
        report.last_update,
        if report.stale && report.last_success.is_some() {
            " (Stale)"
        } else {
            ""
        }
    );
    if let Some(message) = &report.last_message {
        println!("Message:     {}", message);
    }
    println!("Health:      {}", report.health);

    Ok(DdnsExitCode::CleanShutdown)
}

/// `config`
async fn show_config(store: &FileStateStore) -> Result<DdnsExitCode> {
    let document = load_document(store).await?;
    println!("{}", serde_json::to_string_pretty(&document.config.redacted())?);
    Ok(DdnsExitCode::CleanShutdown)
}

/// `test-notify`
async fn test_notify(store: &FileStateStore) -> Result<DdnsExitCode> {
    let document = load_document(store).await?;

    let Some(notifier) = NtfyNotifier::from_config(&document.config.notifications)? else {
        warn!("Notifications are disabled in the configuration.");
        return Ok(DdnsExitCode::CleanShutdown);
    };

    info!("Sending test notification...");
    let notification = Notification::new(
        "Test Notification",
        format!(
            "This is a test notification from the DDNS updater.\nRecords: {}",
            document.config.records.join(", ")
        ),
        Priority::Default,
    );

    match notifier.send(&notification).await {
        Ok(()) => {
            info!("Notification sent!");
            Ok(DdnsExitCode::CleanShutdown)
        }
        Err(e) => {
            error!("Failed to send notification: {}", e);
            Ok(DdnsExitCode::RuntimeError)
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
