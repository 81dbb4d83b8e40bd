//! AI reply composition and urgent-message escalation.

pub mod composer;
pub mod escalation;

pub use composer::ReplyComposer;
pub use escalation::EscalationNotifier;
