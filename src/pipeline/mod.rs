//! Inbound message decision pipeline.
//!
//! A message flows through a fixed chain: group filter → business filter →
//! business heuristic → keyword rules → AI reply. The first stage that
//! handles the message wins; every later stage is skipped.

pub mod business;
pub mod router;
pub mod rules;

pub use business::{BusinessDetector, BUSINESS_THRESHOLD};
pub use router::{MessageRouter, RouteDecision};
pub use rules::{AutoReplyRule, RuleMatcher};
