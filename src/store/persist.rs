//! Atomic whole-document JSON persistence.
//!
//! Each named document is saved by writing a temp file and renaming it over
//! the target, so a crash never leaves a partial write. Reads fall back to a
//! caller-supplied default on a missing or unreadable document.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::StorageError;
use crate::schedule::ScheduleQueue;
use crate::store::contacts::ContactStore;

/// Document names used by the engine.
pub const SETTINGS_DOC: &str = "settings";
pub const RULES_DOC: &str = "rules";
pub const SCHEDULE_DOC: &str = "scheduled";
pub const CONTACTS_DOC: &str = "contacts";

/// JSON file store rooted at a data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Load a document, returning `default` when it is missing or corrupt.
    /// A corrupt document is logged, never fatal.
    pub async fn load<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        let path = self.path_for(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    warn!(doc = name, error = %e, "Failed to parse stored document, using default");
                    default
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => default,
            Err(e) => {
                warn!(doc = name, error = %e, "Failed to read stored document, using default");
                default
            }
        }
    }

    /// Save a document atomically (temp file, then rename).
    pub async fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(name);
        let tmp = self.dir.join(format!(".{name}.json.tmp"));

        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(doc = name, bytes = bytes.len(), "Document saved");
        Ok(())
    }
}

/// Spawn the periodic backup of mutable runtime state (conversations and the
/// scheduled queue). Settings and rules are saved on each API write instead.
pub fn spawn_backup_task(
    store: Arc<FileStore>,
    contacts: Arc<ContactStore>,
    schedule: Arc<ScheduleQueue>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let snapshot = contacts.snapshot().await;
            if let Err(e) = store.save(CONTACTS_DOC, &snapshot).await {
                error!(error = %e, "Failed to back up contact state");
            }
            let entries = schedule.list().await;
            if let Err(e) = store.save(SCHEDULE_DOC, &entries).await {
                error!(error = %e, "Failed to back up scheduled messages");
            }
        }
    })
}
