//! AI reply composition.
//!
//! Builds a persona prompt from per-contact history plus detected language
//! register and urgency, then calls the completion service under a hard
//! timeout. The composed assistant never admits to being automated; its
//! failure mode is silence.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::AiSettings;
use crate::error::CompletionError;
use crate::llm::{ChatMessage, ChatRole, CompletionClient, CompletionRequest};
use crate::reply::escalation::EscalationNotifier;
use crate::store::contacts::{ContactStore, TurnRole};

/// Max tokens for a reply — answers are one or two sentences.
const REPLY_MAX_TOKENS: u32 = 200;

const REPLY_TEMPERATURE: f32 = 0.7;

/// Language register the reply should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    English,
    Hinglish,
}

/// Romanized Hindi tokens that flag the Hinglish register when they appear
/// as whole words.
const HINGLISH_TOKENS: &[&str] = &[
    "hai", "kya", "nahi", "haan", "acha", "accha", "theek", "thik", "bhai", "yaar", "kaise",
    "kyu", "kyun", "matlab", "abhi", "kal", "karo", "karna", "chahiye", "bohot", "bahut", "thoda",
    "hoga", "raha", "rahi", "gaya", "wala",
];

/// Composes AI replies for one inbound message at a time.
pub struct ReplyComposer {
    llm: Arc<dyn CompletionClient>,
    contacts: Arc<ContactStore>,
    notifier: Arc<EscalationNotifier>,
    settings: Arc<RwLock<AiSettings>>,
    debounce: Duration,
    completion_timeout: Duration,
}

impl ReplyComposer {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        contacts: Arc<ContactStore>,
        notifier: Arc<EscalationNotifier>,
        settings: Arc<RwLock<AiSettings>>,
        debounce: Duration,
        completion_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            contacts,
            notifier,
            settings,
            debounce,
            completion_timeout,
        }
    }

    /// Compose a reply for one inbound message.
    ///
    /// Returns `Ok(None)` when the debounce window suppresses the reply.
    /// On completion failure the user turn stays recorded in history and
    /// the error propagates; the caller sends nothing.
    pub async fn compose(
        &self,
        contact_id: &str,
        text: &str,
        display_name: Option<&str>,
    ) -> Result<Option<String>, CompletionError> {
        // Rate check before any mutation beyond the counter bump.
        let gate = self.contacts.note_inbound(contact_id).await;
        if gate.message_count > 1
            && let Some(last) = gate.last_response_time
        {
            let elapsed = Utc::now().signed_duration_since(last);
            if elapsed < chrono::Duration::from_std(self.debounce).unwrap_or_default() {
                debug!(contact = %contact_id, "Reply debounced");
                return Ok(None);
            }
        }

        // The user turn is recorded even if the completion later fails.
        self.contacts
            .append_turn(contact_id, TurnRole::User, text)
            .await;

        let settings = self.settings.read().await.clone();
        let register = detect_register(text);
        let urgent = is_urgent(text, &settings.emergency_keywords);

        let system = build_system_prompt(&settings.owner_name, register, urgent);
        let history = self.contacts.history(contact_id).await;
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(history.into_iter().map(|turn| ChatMessage {
            role: match turn.role {
                TurnRole::User => ChatRole::User,
                TurnRole::Assistant => ChatRole::Assistant,
            },
            content: turn.content,
        }));

        let request = CompletionRequest::new(messages)
            .with_max_tokens(REPLY_MAX_TOKENS)
            .with_temperature(REPLY_TEMPERATURE);

        let reply = tokio::time::timeout(self.completion_timeout, self.llm.complete(request))
            .await
            .map_err(|_| CompletionError::Timeout {
                after: self.completion_timeout,
            })??;

        self.contacts
            .append_turn(contact_id, TurnRole::Assistant, &reply)
            .await;
        self.contacts.record_reply(contact_id).await;

        info!(
            contact = %contact_id,
            urgent,
            register = ?register,
            "AI reply composed"
        );

        if urgent && !settings.emergency_contact.trim().is_empty() {
            // Escalation is bounded like the completion call; neither its
            // failure nor a wedged transport session affects the reply.
            let name = display_name.unwrap_or(contact_id);
            let notify = self
                .notifier
                .notify(&settings.emergency_contact, contact_id, name, text);
            if tokio::time::timeout(self.completion_timeout, notify)
                .await
                .is_err()
            {
                warn!(contact = %contact_id, "Escalation send timed out");
            }
        } else if urgent {
            warn!(contact = %contact_id, "Urgent message but no emergency contact configured");
        }

        Ok(Some(reply))
    }
}

/// Detect the target language register: Devanagari codepoints or romanized
/// Hindi tokens (whole word, case-insensitive) mean Hinglish.
pub fn detect_register(text: &str) -> Register {
    if text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)) {
        return Register::Hinglish;
    }
    let hinglish = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|word| {
            let lower = word.to_lowercase();
            HINGLISH_TOKENS.contains(&lower.as_str())
        });
    if hinglish {
        Register::Hinglish
    } else {
        Register::English
    }
}

/// Urgency: any configured keyword appears as a case-insensitive substring.
pub fn is_urgent(text: &str, keywords: &[String]) -> bool {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
}

/// Persona instruction: a human personal assistant of the named principal.
fn build_system_prompt(owner_name: &str, register: Register, urgent: bool) -> String {
    let mut prompt = format!(
        "You are the personal assistant of {owner_name}, replying on their phone while they \
         are unavailable. You are a real human assistant. Never state or imply that you are \
         automated, an AI, or a bot. Keep replies to 1-2 short sentences, warm and natural."
    );

    match register {
        Register::Hinglish => prompt.push_str(
            " Reply in Hinglish (casual romanized Hindi mixed with English), matching the \
             sender's tone.",
        ),
        Register::English => prompt.push_str(" Reply in casual English."),
    }

    if urgent {
        prompt.push_str(
            " The sender's message is URGENT: acknowledge the urgency and promise that you are \
             reaching the owner right away.",
        );
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use crate::error::TransportError;
    use crate::transport::{ChatMetadata, ContactMetadata, MessageStream, Transport};

    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn start(&self) -> Result<MessageStream, TransportError> {
            unimplemented!("not used")
        }

        async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
            self.sent
                .lock()
                .await
                .push((recipient.to_string(), text.to_string()));
            Ok(())
        }

        async fn contact_metadata(&self, _id: &str) -> Result<ContactMetadata, TransportError> {
            Ok(ContactMetadata::default())
        }

        async fn chat_metadata(&self, _id: &str) -> Result<ChatMetadata, TransportError> {
            Ok(ChatMetadata::default())
        }
    }

    /// Transport whose sends never resolve, as a wedged session would.
    struct StalledTransport;

    #[async_trait]
    impl Transport for StalledTransport {
        fn name(&self) -> &str {
            "stalled"
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn start(&self) -> Result<MessageStream, TransportError> {
            unimplemented!("not used")
        }

        async fn send(&self, _recipient: &str, _text: &str) -> Result<(), TransportError> {
            std::future::pending().await
        }

        async fn contact_metadata(&self, _id: &str) -> Result<ContactMetadata, TransportError> {
            Ok(ContactMetadata::default())
        }

        async fn chat_metadata(&self, _id: &str) -> Result<ChatMetadata, TransportError> {
            Ok(ChatMetadata::default())
        }
    }

    struct FixedLlm {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionClient for FixedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl CompletionClient for FailingLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
            Err(CompletionError::Api {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    fn test_settings() -> AiSettings {
        AiSettings {
            enabled: true,
            api_key: "sk-test".into(),
            emergency_contact: String::new(),
            owner_name: "Ravi".into(),
            ..AiSettings::default()
        }
    }

    fn composer_with(
        llm: Arc<dyn CompletionClient>,
        transport: Arc<RecordingTransport>,
        settings: AiSettings,
    ) -> (ReplyComposer, Arc<ContactStore>) {
        let contacts = ContactStore::new(8);
        let notifier = Arc::new(EscalationNotifier::new(transport));
        let composer = ReplyComposer::new(
            llm,
            contacts.clone(),
            notifier,
            Arc::new(RwLock::new(settings)),
            Duration::from_secs(3),
            Duration::from_secs(25),
        );
        (composer, contacts)
    }

    // ── Register detection ──────────────────────────────────────────

    #[test]
    fn devanagari_means_hinglish() {
        assert_eq!(detect_register("मैं ठीक हूँ"), Register::Hinglish);
    }

    #[test]
    fn romanized_hindi_tokens_mean_hinglish() {
        assert_eq!(detect_register("kal milte hain kya"), Register::Hinglish);
        assert_eq!(detect_register("THEEK hai bhai"), Register::Hinglish);
    }

    #[test]
    fn plain_english_stays_english() {
        assert_eq!(detect_register("see you tomorrow at five"), Register::English);
        // "hai" must match as a whole word only
        assert_eq!(detect_register("hairdresser appointment"), Register::English);
    }

    // ── Urgency detection ───────────────────────────────────────────

    #[test]
    fn urgency_is_substring_case_insensitive() {
        let keywords = vec!["urgent".to_string(), "madad".to_string()];
        assert!(is_urgent("this is URGENT!!", &keywords));
        assert!(is_urgent("madad chahiye", &keywords));
        assert!(!is_urgent("all good here", &keywords));
    }

    // ── Prompt construction ─────────────────────────────────────────

    #[test]
    fn system_prompt_sets_persona_and_register() {
        let prompt = build_system_prompt("Ravi", Register::Hinglish, false);
        assert!(prompt.contains("personal assistant of Ravi"));
        assert!(prompt.contains("Never state or imply"));
        assert!(prompt.contains("Hinglish"));
        assert!(!prompt.contains("URGENT"));
    }

    #[test]
    fn system_prompt_adds_urgency_directive() {
        let prompt = build_system_prompt("Ravi", Register::English, true);
        assert!(prompt.contains("URGENT"));
        assert!(prompt.contains("reaching the owner"));
    }

    // ── Compose flow ────────────────────────────────────────────────

    #[tokio::test]
    async fn compose_returns_reply_and_updates_history() {
        let llm = Arc::new(FixedLlm {
            reply: "Sure, will pass it on.".into(),
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
        });
        let (composer, contacts) = composer_with(llm, transport, test_settings());

        let reply = composer
            .compose("alice", "can you ask him to call me?", Some("Alice"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("Sure, will pass it on."));

        let record = contacts.conversation("alice").await.unwrap();
        assert!(record.has_introduced);
        assert!(record.last_response_time.is_some());
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.messages[0].role, TurnRole::User);
        assert_eq!(record.messages[1].role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn second_message_within_debounce_is_suppressed() {
        let llm = Arc::new(FixedLlm {
            reply: "ok".into(),
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
        });
        let (composer, _contacts) = composer_with(llm.clone(), transport, test_settings());

        let first = composer.compose("bob", "hello?", None).await.unwrap();
        assert!(first.is_some());

        // Immediately again: inside the 3s window of the successful reply.
        let second = composer.compose("bob", "you there?", None).await.unwrap();
        assert!(second.is_none());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_message_is_never_debounced() {
        let llm = Arc::new(FixedLlm {
            reply: "hi!".into(),
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
        });
        let (composer, _contacts) = composer_with(llm, transport, test_settings());

        let reply = composer.compose("carol", "hey", None).await.unwrap();
        assert!(reply.is_some());
    }

    #[tokio::test]
    async fn completion_failure_keeps_user_turn() {
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
        });
        let (composer, contacts) =
            composer_with(Arc::new(FailingLlm), transport, test_settings());

        let result = composer.compose("dave", "hello", None).await;
        assert!(result.is_err());

        let record = contacts.conversation("dave").await.unwrap();
        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.messages[0].role, TurnRole::User);
        assert!(!record.has_introduced);
        assert!(record.last_response_time.is_none());
    }

    #[tokio::test]
    async fn urgent_message_triggers_escalation_with_verbatim_text() {
        let llm = Arc::new(FixedLlm {
            reply: "On it, checking right away.".into(),
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
        });
        let mut settings = test_settings();
        settings.emergency_contact = "919900112233".into();
        let (composer, _contacts) = composer_with(llm, transport.clone(), settings);

        let reply = composer
            .compose("eve", "emergency please help now", Some("Eve"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some("On it, checking right away."));

        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "919900112233@s.whatsapp.net");
        assert!(sent[0].1.contains("emergency please help now"));
        assert!(sent[0].1.contains("Eve"));
    }

    #[tokio::test]
    async fn stalled_escalation_send_does_not_block_reply() {
        let llm = Arc::new(FixedLlm {
            reply: "On it.".into(),
            calls: AtomicUsize::new(0),
        });
        let contacts = ContactStore::new(8);
        let notifier = Arc::new(EscalationNotifier::new(Arc::new(StalledTransport)));
        let mut settings = test_settings();
        settings.emergency_contact = "919900112233".into();
        let composer = ReplyComposer::new(
            llm,
            contacts,
            notifier,
            Arc::new(RwLock::new(settings)),
            Duration::from_secs(3),
            Duration::from_millis(100),
        );

        let reply = tokio::time::timeout(
            Duration::from_secs(2),
            composer.compose("eve", "emergency please help now", Some("Eve")),
        )
        .await
        .expect("compose must return despite the stalled escalation send")
        .unwrap();
        assert_eq!(reply.as_deref(), Some("On it."));
    }

    #[tokio::test]
    async fn urgent_without_emergency_contact_skips_escalation() {
        let llm = Arc::new(FixedLlm {
            reply: "On it.".into(),
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(RecordingTransport {
            sent: Mutex::new(Vec::new()),
        });
        let (composer, _contacts) = composer_with(llm, transport.clone(), test_settings());

        let reply = composer.compose("frank", "urgent!!", None).await.unwrap();
        assert!(reply.is_some());
        assert!(transport.sent.lock().await.is_empty());
    }
}
