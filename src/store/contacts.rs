//! Per-contact conversation and business-detection state.
//!
//! Single logical owner of both maps. All message-path mutation goes through
//! the async methods here, so the history-window, debounce, and sticky-flag
//! invariants hold even when callers run on different tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One stored conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation state for one contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Most recent turns, oldest first. Bounded by the store window.
    pub messages: Vec<ConversationTurn>,
    /// Set after the first AI reply; never reset.
    pub has_introduced: bool,
    /// Inbound messages considered for an AI reply. Monotonic.
    pub message_count: u64,
    /// Set once at record creation; drives retention.
    pub first_message_time: DateTime<Utc>,
    /// Last successful AI reply; drives the debounce check.
    pub last_response_time: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            messages: Vec::new(),
            has_introduced: false,
            message_count: 0,
            first_message_time: now,
            last_response_time: None,
        }
    }
}

/// Business-detection state for one contact. `is_business` is sticky and
/// `detection_confidence` only grows (capped at 100).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessContactRecord {
    pub is_business: bool,
    pub detection_confidence: u8,
}

/// Snapshot of the debounce-relevant fields, taken while recording an
/// inbound message.
#[derive(Debug, Clone, Copy)]
pub struct InboundGate {
    pub message_count: u64,
    pub last_response_time: Option<DateTime<Utc>>,
}

/// Serializable snapshot of the whole store, for periodic backup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactsSnapshot {
    pub conversations: HashMap<String, ConversationRecord>,
    pub business: HashMap<String, BusinessContactRecord>,
}

/// Owner of per-contact conversation and business records.
pub struct ContactStore {
    window: usize,
    conversations: RwLock<HashMap<String, ConversationRecord>>,
    business: RwLock<HashMap<String, BusinessContactRecord>>,
}

impl ContactStore {
    /// Create an empty store with the given history window.
    pub fn new(window: usize) -> Arc<Self> {
        Arc::new(Self {
            window,
            conversations: RwLock::new(HashMap::new()),
            business: RwLock::new(HashMap::new()),
        })
    }

    /// Restore a store from a backup snapshot.
    pub fn from_snapshot(window: usize, snapshot: ContactsSnapshot) -> Arc<Self> {
        Arc::new(Self {
            window,
            conversations: RwLock::new(snapshot.conversations),
            business: RwLock::new(snapshot.business),
        })
    }

    // ── Conversation state ──────────────────────────────────────────

    /// Record an inbound message considered for an AI reply: creates the
    /// record lazily, bumps the counter, and returns the fields the
    /// debounce check needs.
    pub async fn note_inbound(&self, contact_id: &str) -> InboundGate {
        let mut conversations = self.conversations.write().await;
        let record = conversations
            .entry(contact_id.to_string())
            .or_insert_with(|| ConversationRecord::new(Utc::now()));
        record.message_count += 1;
        InboundGate {
            message_count: record.message_count,
            last_response_time: record.last_response_time,
        }
    }

    /// Append a turn, trimming to the window (FIFO).
    pub async fn append_turn(&self, contact_id: &str, role: TurnRole, content: &str) {
        let mut conversations = self.conversations.write().await;
        let record = conversations
            .entry(contact_id.to_string())
            .or_insert_with(|| ConversationRecord::new(Utc::now()));
        record.messages.push(ConversationTurn {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        let overflow = record.messages.len().saturating_sub(self.window);
        if overflow > 0 {
            record.messages.drain(..overflow);
        }
    }

    /// History snapshot for prompt building, oldest first.
    pub async fn history(&self, contact_id: &str) -> Vec<ConversationTurn> {
        self.conversations
            .read()
            .await
            .get(contact_id)
            .map(|r| r.messages.clone())
            .unwrap_or_default()
    }

    /// Mark a successful AI reply: introduction flag + debounce timestamp.
    pub async fn record_reply(&self, contact_id: &str) {
        let mut conversations = self.conversations.write().await;
        if let Some(record) = conversations.get_mut(contact_id) {
            record.has_introduced = true;
            record.last_response_time = Some(Utc::now());
        }
    }

    /// Read-only view of one conversation record.
    pub async fn conversation(&self, contact_id: &str) -> Option<ConversationRecord> {
        self.conversations.read().await.get(contact_id).cloned()
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }

    // ── Business state ──────────────────────────────────────────────

    /// Whether this contact has been confirmed as a business account.
    pub async fn is_business(&self, contact_id: &str) -> bool {
        self.business
            .read()
            .await
            .get(contact_id)
            .is_some_and(|r| r.is_business)
    }

    /// Mark a contact business directly (transport-verified flag).
    pub async fn mark_business(&self, contact_id: &str) {
        let mut business = self.business.write().await;
        let record = business.entry(contact_id.to_string()).or_default();
        if !record.is_business {
            record.is_business = true;
            info!(contact = %contact_id, "Contact marked as business");
        }
    }

    /// Add an observed heuristic score to the contact's confidence
    /// (capped at 100) and flip `is_business` once the running total first
    /// reaches `threshold`. Returns the is_business state after the update.
    ///
    /// Observation only — the caller decides what to do with this message.
    pub async fn accumulate_business(&self, contact_id: &str, score: u8, threshold: u8) -> bool {
        let mut business = self.business.write().await;
        let record = business.entry(contact_id.to_string()).or_default();
        record.detection_confidence = record.detection_confidence.saturating_add(score).min(100);
        if !record.is_business && record.detection_confidence >= threshold {
            record.is_business = true;
            info!(
                contact = %contact_id,
                confidence = record.detection_confidence,
                "Business threshold crossed"
            );
        }
        record.is_business
    }

    /// Read-only view of one business record.
    pub async fn business_record(&self, contact_id: &str) -> Option<BusinessContactRecord> {
        self.business.read().await.get(contact_id).cloned()
    }

    pub async fn business_count(&self) -> usize {
        self.business
            .read()
            .await
            .values()
            .filter(|r| r.is_business)
            .count()
    }

    // ── Retention ───────────────────────────────────────────────────

    /// Remove conversations whose first message is older than `horizon`,
    /// along with their paired business records. Returns the count removed.
    pub async fn sweep_expired(&self, horizon: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(horizon).unwrap_or_else(|_| chrono::Duration::days(7));

        let mut conversations = self.conversations.write().await;
        let expired: Vec<String> = conversations
            .iter()
            .filter(|(_, r)| r.first_message_time < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            conversations.remove(id);
        }
        drop(conversations);

        if !expired.is_empty() {
            let mut business = self.business.write().await;
            for id in &expired {
                business.remove(id);
            }
            info!(removed = expired.len(), "Retention sweep purged contacts");
        }

        expired.len()
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Snapshot both maps for backup.
    pub async fn snapshot(&self) -> ContactsSnapshot {
        ContactsSnapshot {
            conversations: self.conversations.read().await.clone(),
            business: self.business.read().await.clone(),
        }
    }
}

/// Spawn the periodic retention sweep. Runs off the message path.
pub fn spawn_retention_task(
    store: Arc<ContactStore>,
    interval: Duration,
    horizon: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = store.sweep_expired(horizon).await;
            if removed > 0 {
                debug!(removed, "Retention sweep tick");
            }
        }
    })
}
