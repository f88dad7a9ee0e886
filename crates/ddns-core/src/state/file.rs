// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Keeps settings and reconciliation state across daemon restarts and
// crashes, in the same `config.json` layout the setup tooling writes.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good document
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "apiToken": "…",
//   "records": ["home.example.com"],
//   "interval": 300,
//   "lastKnownIp": { "v4": "203.0.113.7" },
//   "lastSuccess": "2026-01-09T12:00:00Z",
//   "lastMessage": "Service is running normally."
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::state::DdnsDocument;
use crate::traits::state_store::StateStore;

/// File-based state store with crash recovery
///
/// # Crash Recovery
///
/// - **Atomic writes**: New document written to temporary file, then renamed
/// - **Backup**: Last known good document kept in `.backup` file
/// - **Corruption detection**: JSON validation on load
/// - **Automatic recovery**: Falls back to backup if main file corrupted
///
/// The file holds the API token, so on Unix it is written with mode 0600.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::state::FileStateStore;
/// use ddns_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/etc/ddns/config.json").await?;
///
///     if let Some(doc) = store.load().await? {
///         println!("managing {} record(s)", doc.config.records.len());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a file state store, creating parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    /// Path of the main document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main file
    /// 2. If it does not parse, try loading backup (and restore it)
    /// 3. If backup is missing or also corrupt, report the original error
    async fn load_with_recovery(&self) -> Result<Option<DdnsDocument>, Error> {
        let error = match Self::load_document(&self.path).await {
            Ok(doc) => return Ok(doc),
            Err(Error::Json(e)) => e,
            Err(other) => return Err(other),
        };

        tracing::warn!(
            "State file {} appears corrupted: {}. Attempting recovery from backup.",
            self.path.display(),
            error
        );

        let backup_path = Self::backup_path(&self.path);
        match Self::load_document(&backup_path).await {
            Ok(Some(doc)) => {
                tracing::info!("Recovered state from backup {}", backup_path.display());

                if let Err(restore_err) = Self::restore_from_backup(&self.path, &backup_path).await {
                    tracing::error!("Failed to restore state file from backup: {}", restore_err);
                }

                Ok(Some(doc))
            }
            Ok(None) => Err(Error::persistence(format!(
                "State file {} is corrupted and no backup exists: {}",
                self.path.display(),
                error
            ))),
            Err(backup_err) => Err(Error::persistence(format!(
                "State file {} is corrupted ({}) and backup is unusable ({})",
                self.path.display(),
                error,
                backup_err
            ))),
        }
    }

    /// Load a document from `path`; a missing file is `Ok(None)`
    async fn load_document(path: &Path) -> Result<Option<DdnsDocument>, Error> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("State file does not exist: {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "Failed to read state file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let doc: DdnsDocument = serde_json::from_str(&content)?;
        Ok(Some(doc))
    }

    /// Write the document atomically
    async fn write_document(&self, document: &DdnsDocument) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| Error::persistence(format!("Failed to serialize state: {}", e)))?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = file
                    .set_permissions(std::fs::Permissions::from_mode(0o600))
                    .await
                {
                    tracing::warn!("Failed to restrict state file permissions: {}", e);
                }
            }

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Create backup of current file (if it exists)
        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore state file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::persistence(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<DdnsDocument>, Error> {
        self.load_with_recovery().await
    }

    async fn save(&self, document: &DdnsDocument) -> Result<(), Error> {
        self.write_document(document).await
    }
}
