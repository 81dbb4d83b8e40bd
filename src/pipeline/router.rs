//! Message router — drives one inbound message through the decision chain.
//!
//! Order is fixed; the first stage that handles the message wins:
//! 1. Group filter — group-chat messages are discarded silently.
//! 2. Business filter — transport-flagged or locally confirmed business
//!    contacts are discarded silently.
//! 3. Business heuristic — score the text, accumulate confidence; crossing
//!    the threshold marks the contact and discards the message (no
//!    courtesy reply on first detection).
//! 4. Keyword rules — first match sends its fixed response; no AI call, no
//!    conversation-state change.
//! 5. AI path — only with AI enabled and a credential configured.
//!
//! Metadata lookups may fail; filters then default to permissive so a
//! transport hiccup never silently kills legitimate replies. At most one
//! outbound send happens per inbound message. All failures degrade to
//! silence — the persona must not reveal automation through error text.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::AiSettings;
use crate::pipeline::business::{BUSINESS_THRESHOLD, BusinessDetector};
use crate::pipeline::rules::RuleMatcher;
use crate::reply::composer::ReplyComposer;
use crate::store::contacts::ContactStore;
use crate::transport::{IncomingMessage, Transport};

/// Where a business verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessSource {
    /// The transport's own account flag.
    Transport,
    /// Our accumulated heuristic state.
    Local,
}

/// Outcome of routing one inbound message. Each variant corresponds to the
/// stage that handled the message, which makes every stage testable on its
/// own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Group chat — discarded.
    SkippedGroup,
    /// Known business contact — discarded.
    SkippedBusiness { source: BusinessSource },
    /// This message first crossed the business threshold — marked, discarded.
    BusinessDetected { score: u8 },
    /// A keyword rule matched and its fixed response was sent.
    RuleReply { trigger: String },
    /// An AI reply was composed and sent.
    AiReply,
    /// Nothing was sent (AI disabled, debounced, or a failure degraded to
    /// silence).
    NoReply { reason: &'static str },
}

impl RouteDecision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SkippedGroup => "skipped_group",
            Self::SkippedBusiness { .. } => "skipped_business",
            Self::BusinessDetected { .. } => "business_detected",
            Self::RuleReply { .. } => "rule_reply",
            Self::AiReply => "ai_reply",
            Self::NoReply { .. } => "no_reply",
        }
    }
}

/// Orchestrates the decision chain for inbound messages.
pub struct MessageRouter {
    transport: Arc<dyn Transport>,
    contacts: Arc<ContactStore>,
    rules: Arc<RwLock<RuleMatcher>>,
    detector: BusinessDetector,
    composer: Arc<ReplyComposer>,
    settings: Arc<RwLock<AiSettings>>,
}

impl MessageRouter {
    pub fn new(
        transport: Arc<dyn Transport>,
        contacts: Arc<ContactStore>,
        rules: Arc<RwLock<RuleMatcher>>,
        composer: Arc<ReplyComposer>,
        settings: Arc<RwLock<AiSettings>>,
    ) -> Self {
        Self {
            transport,
            contacts,
            rules,
            detector: BusinessDetector::new(),
            composer,
            settings,
        }
    }

    /// Route one inbound message. Never fails: internal errors are logged
    /// and collapse to a no-send decision.
    pub async fn route(&self, message: &IncomingMessage) -> RouteDecision {
        let decision = self.decide(message).await;
        info!(
            id = %message.id,
            sender = %message.sender,
            decision = decision.label(),
            "Inbound message routed"
        );
        decision
    }

    async fn decide(&self, message: &IncomingMessage) -> RouteDecision {
        // 1. Group filter.
        match self.transport.chat_metadata(&message.chat_id).await {
            Ok(chat) if chat.is_group => {
                debug!(chat = %message.chat_id, "Group message discarded");
                return RouteDecision::SkippedGroup;
            }
            Ok(_) => {}
            Err(e) => {
                // Unknown chat kind: stay permissive.
                warn!(chat = %message.chat_id, error = %e, "Chat metadata lookup failed");
            }
        }

        // 2. Business filter. The transport flag is consulted before our
        // heuristic state, so a transport false negative is not corrected
        // within this same call (kept as-is; review point).
        match self.transport.contact_metadata(&message.sender).await {
            Ok(contact) if contact.is_business || contact.is_enterprise => {
                debug!(contact = %message.sender, "Transport-flagged business contact discarded");
                return RouteDecision::SkippedBusiness {
                    source: BusinessSource::Transport,
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!(contact = %message.sender, error = %e, "Contact metadata lookup failed");
            }
        }
        if self.contacts.is_business(&message.sender).await {
            return RouteDecision::SkippedBusiness {
                source: BusinessSource::Local,
            };
        }

        // 3. Business heuristic: observe first, then decide for this
        // message. A contact crossing the threshold right now gets silence.
        let score = self.detector.score(&message.text);
        if score > 0 {
            let confirmed = self
                .contacts
                .accumulate_business(&message.sender, score, BUSINESS_THRESHOLD)
                .await;
            if confirmed {
                return RouteDecision::BusinessDetected { score };
            }
        }

        // 4. Keyword rules: fixed response, no conversation-state change.
        let rule_hit = self
            .rules
            .read()
            .await
            .first_match(&message.text)
            .map(|rule| (rule.trigger.clone(), rule.response.clone()));
        if let Some((trigger, response)) = rule_hit {
            if let Err(e) = self.transport.send(&message.sender, &response).await {
                error!(contact = %message.sender, error = %e, "Rule reply send failed");
                return RouteDecision::NoReply {
                    reason: "send failed",
                };
            }
            return RouteDecision::RuleReply { trigger };
        }

        // 5. AI path.
        if !self.settings.read().await.ai_ready() {
            return RouteDecision::NoReply {
                reason: "ai disabled",
            };
        }

        let display_name = message.sender_name.as_deref();
        match self
            .composer
            .compose(&message.sender, &message.text, display_name)
            .await
        {
            Ok(Some(reply)) => {
                if let Err(e) = self.transport.send(&message.sender, &reply).await {
                    error!(contact = %message.sender, error = %e, "AI reply send failed");
                    return RouteDecision::NoReply {
                        reason: "send failed",
                    };
                }
                RouteDecision::AiReply
            }
            Ok(None) => RouteDecision::NoReply {
                reason: "debounced",
            },
            Err(e) => {
                // Silence is the failure mode; no retry, no error message.
                error!(contact = %message.sender, error = %e, "Reply composition failed");
                RouteDecision::NoReply {
                    reason: "completion failed",
                }
            }
        }
    }
}
