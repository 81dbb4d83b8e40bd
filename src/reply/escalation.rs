//! Urgent-message escalation to a configured human contact.

use std::sync::Arc;

use chrono::Local;
use tracing::{error, info};

use crate::error::TransportError;
use crate::transport::{Transport, normalize_recipient};

/// Sends a fixed-template alert when an inbound message is urgent.
pub struct EscalationNotifier {
    transport: Arc<dyn Transport>,
}

impl EscalationNotifier {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Alert the emergency contact about an urgent inbound message.
    ///
    /// Failure is logged and returned, but callers on the reply path ignore
    /// it — a lost alert must never affect the reply already composed.
    pub async fn notify(
        &self,
        emergency_contact: &str,
        sender_id: &str,
        sender_name: &str,
        original_text: &str,
    ) -> Result<(), TransportError> {
        let recipient = normalize_recipient(emergency_contact);
        let alert = format_alert(sender_name, sender_id, original_text);

        match self.transport.send(&recipient, &alert).await {
            Ok(()) => {
                info!(recipient = %recipient, from = %sender_id, "Escalation alert sent");
                Ok(())
            }
            Err(e) => {
                error!(recipient = %recipient, error = %e, "Escalation alert failed");
                Err(e)
            }
        }
    }
}

/// Alert template: sender, id, verbatim message, localized timestamp.
fn format_alert(sender_name: &str, sender_id: &str, original_text: &str) -> String {
    format!(
        "🚨 URGENT message\nFrom: {} ({})\n\n\"{}\"\n\nReceived: {}",
        sender_name,
        sender_id,
        original_text,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
    )
}
