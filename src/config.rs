//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default emergency keywords checked against inbound text
/// (case-insensitive substring match).
pub const DEFAULT_EMERGENCY_KEYWORDS: &[&str] = &[
    "emergency",
    "urgent",
    "help",
    "asap",
    "accident",
    "hospital",
    "police",
    "turant",
    "jaldi",
    "madad",
];

/// AI auto-reply settings. Persisted as a whole document and editable
/// through the control API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    /// Master switch for the AI reply path.
    pub enabled: bool,
    /// Completion-service credential. Opaque; redacted in API reads.
    pub api_key: String,
    /// Completion model identifier.
    pub model: String,
    /// Contact that receives urgent-message escalations. Empty = disabled.
    pub emergency_contact: String,
    /// The principal the assistant speaks for.
    pub owner_name: String,
    /// Keywords that mark an inbound message as urgent.
    pub emergency_keywords: Vec<String>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            emergency_contact: String::new(),
            owner_name: "the owner".to_string(),
            emergency_keywords: DEFAULT_EMERGENCY_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AiSettings {
    /// AI replies require both the switch and a credential.
    pub fn ai_ready(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }

    /// Override the stored credential with an environment-supplied one.
    /// Only the key changes; `enabled` keeps its stored value.
    pub fn apply_env_credential(&mut self, key: Option<String>) {
        if let Some(key) = key
            && !key.trim().is_empty()
        {
            self.api_key = key;
        }
    }
}

/// Runtime tunables for the engine. Not persisted.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Conversation history window per contact (turns kept, FIFO trim).
    pub history_window: usize,
    /// Minimum gap between two AI replies to the same contact.
    pub reply_debounce: Duration,
    /// Conversations older than this are purged by the retention sweep.
    pub retention_horizon: Duration,
    /// Hard timeout for one completion call.
    pub completion_timeout: Duration,
    /// Scheduled-send dispatcher tick interval.
    pub dispatch_interval: Duration,
    /// Retention sweep interval.
    pub sweep_interval: Duration,
    /// Periodic state backup interval.
    pub backup_interval: Duration,
    /// Control API listen port.
    pub http_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_window: 8,
            reply_debounce: Duration::from_secs(3),
            retention_horizon: Duration::from_secs(7 * 24 * 3600),
            completion_timeout: Duration::from_secs(25),
            dispatch_interval: Duration::from_secs(45),
            sweep_interval: Duration::from_secs(3600),
            backup_interval: Duration::from_secs(300),
            http_port: 8900,
        }
    }
}
