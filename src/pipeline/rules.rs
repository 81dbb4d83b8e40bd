//! Keyword auto-reply rules.
//!
//! Rules are an ordered list; the first rule whose trigger is a
//! case-insensitive substring of the inbound text wins. A match bypasses
//! the AI path entirely and does not touch conversation state.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One keyword rule: fixed response for a trigger substring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoReplyRule {
    pub trigger: String,
    pub response: String,
}

/// Ordered rule set with first-match-wins evaluation.
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<AutoReplyRule>,
}

impl RuleMatcher {
    pub fn new(rules: Vec<AutoReplyRule>) -> Self {
        Self { rules }
    }

    /// Replace the whole rule list (control-API writes).
    pub fn set_rules(&mut self, rules: Vec<AutoReplyRule>) {
        self.rules = rules;
    }

    pub fn rules(&self) -> &[AutoReplyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule (list order) whose trigger is a case-insensitive
    /// substring of `text`, or `None`.
    pub fn first_match(&self, text: &str) -> Option<&AutoReplyRule> {
        let haystack = text.to_lowercase();
        let hit = self
            .rules
            .iter()
            .find(|rule| haystack.contains(&rule.trigger.to_lowercase()));
        if let Some(rule) = hit {
            debug!(trigger = %rule.trigger, "Keyword rule matched");
        }
        hit
    }
}
