//! Scheduled-send dispatcher.
//!
//! Users queue outbound messages with a target time; a fixed-interval ticker
//! sends the due ones. Success is represented by removal from the queue —
//! there is no `sent` status. A send error marks the entry `failed` and
//! keeps it for manual inspection; nothing is retried automatically.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::transport::{Transport, normalize_recipient};

/// Status of a queued entry. `failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Pending,
    Failed,
}

/// One user-scheduled outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMessage {
    pub id: Uuid,
    /// Destination — raw phone number or transport address.
    pub phone: String,
    pub message: String,
    /// Due time; entries with `datetime <= now` are sent on the next tick.
    pub datetime: DateTime<Utc>,
    pub status: SendStatus,
}

impl ScheduledMessage {
    pub fn new(phone: &str, message: &str, datetime: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            message: message.to_string(),
            datetime,
            status: SendStatus::Pending,
        }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == SendStatus::Pending && self.datetime <= now
    }
}

/// Shared queue of scheduled messages.
pub struct ScheduleQueue {
    entries: RwLock<Vec<ScheduledMessage>>,
}

impl ScheduleQueue {
    pub fn new(entries: Vec<ScheduledMessage>) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(entries),
        })
    }

    pub async fn add(&self, entry: ScheduledMessage) {
        info!(id = %entry.id, due = %entry.datetime, "Scheduled message queued");
        self.entries.write().await.push(entry);
    }

    /// Remove one entry by id. Returns whether anything was removed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub async fn list(&self) -> Vec<ScheduledMessage> {
        self.entries.read().await.clone()
    }

    pub async fn counts(&self) -> (usize, usize) {
        let entries = self.entries.read().await;
        let pending = entries
            .iter()
            .filter(|e| e.status == SendStatus::Pending)
            .count();
        (pending, entries.len() - pending)
    }
}

/// Result of one dispatcher tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Polls the queue and sends due entries.
pub struct ScheduleDispatcher {
    queue: Arc<ScheduleQueue>,
    transport: Arc<dyn Transport>,
}

impl ScheduleDispatcher {
    pub fn new(queue: Arc<ScheduleQueue>, transport: Arc<dyn Transport>) -> Self {
        Self { queue, transport }
    }

    /// One tick: no-op while disconnected; otherwise send every due pending
    /// entry, removing it on success and marking it `failed` on error.
    ///
    /// The queue lock is only held to snapshot the due entries and to apply
    /// each result, never across a send, so readers stay unblocked.
    pub async fn tick(&self) -> DispatchOutcome {
        if !self.transport.is_connected() {
            debug!("Dispatcher tick skipped: transport disconnected");
            return DispatchOutcome::default();
        }

        let now = Utc::now();
        let due: Vec<(Uuid, String, String)> = {
            let entries = self.queue.entries.read().await;
            entries
                .iter()
                .filter(|e| e.is_due(now))
                .map(|e| (e.id, normalize_recipient(&e.phone), e.message.clone()))
                .collect()
        };

        let mut outcome = DispatchOutcome::default();
        for (id, recipient, message) in due {
            match self.transport.send(&recipient, &message).await {
                Ok(()) => {
                    info!(id = %id, recipient = %recipient, "Scheduled message sent");
                    self.queue.entries.write().await.retain(|e| e.id != id);
                    outcome.sent += 1;
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Scheduled send failed");
                    let mut entries = self.queue.entries.write().await;
                    // The entry may have been removed through the API mid-send.
                    if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                        entry.status = SendStatus::Failed;
                    }
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}

/// Spawn the fixed-interval dispatcher ticker.
pub fn spawn_dispatch_task(
    dispatcher: Arc<ScheduleDispatcher>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let outcome = dispatcher.tick().await;
            if outcome.sent > 0 || outcome.failed > 0 {
                info!(sent = outcome.sent, failed = outcome.failed, "Dispatcher tick");
            }
        }
    })
}
