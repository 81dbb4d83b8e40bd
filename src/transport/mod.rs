//! Chat-transport seam.
//!
//! The engine never talks to a messaging network directly. It consumes a
//! [`Transport`]: an inbound message stream, a send capability, and
//! contact/chat metadata lookups. A stdin/stdout [`local::LocalTransport`]
//! is provided for development.

pub mod local;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// One inbound, non-self-authored message from the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Transport-native message id.
    pub id: String,
    /// Chat the message arrived in (equals `sender` for direct chats).
    pub chat_id: String,
    /// Stable contact id of the sender.
    pub sender: String,
    /// Human-readable sender name, if the transport knows one.
    pub sender_name: Option<String>,
    /// Message body.
    pub text: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(id: &str, sender: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            chat_id: sender.to_string(),
            sender: sender.to_string(),
            sender_name: None,
            text: text.to_string(),
            received_at: Utc::now(),
        }
    }
}

/// Contact metadata as reported by the transport.
#[derive(Debug, Clone, Default)]
pub struct ContactMetadata {
    /// Transport-verified business account.
    pub is_business: bool,
    /// Transport-verified enterprise account.
    pub is_enterprise: bool,
    /// Display name, if known.
    pub display_name: Option<String>,
}

/// Chat metadata as reported by the transport.
#[derive(Debug, Clone, Default)]
pub struct ChatMetadata {
    /// Multi-party chat.
    pub is_group: bool,
    /// Chat name, if known.
    pub name: Option<String>,
}

/// Stream of inbound messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// Transport seam — pure I/O, no decision logic.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging.
    fn name(&self) -> &str;

    /// Whether the session is currently connected.
    fn is_connected(&self) -> bool;

    /// Start delivering inbound messages.
    async fn start(&self) -> Result<MessageStream, TransportError>;

    /// Send a text message to a recipient id.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError>;

    /// Look up contact metadata. May fail; callers treat failure as unknown.
    async fn contact_metadata(&self, id: &str) -> Result<ContactMetadata, TransportError>;

    /// Look up chat metadata. May fail; callers treat failure as unknown.
    async fn chat_metadata(&self, id: &str) -> Result<ChatMetadata, TransportError>;
}

/// Normalize a raw recipient (phone number or id) into a transport address:
/// already-addressed ids pass through, anything else is reduced to digits
/// and given the direct-chat domain suffix.
pub fn normalize_recipient(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('@') {
        return trimmed.to_string();
    }
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits}@s.whatsapp.net")
}
