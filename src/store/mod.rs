//! State ownership: per-contact conversation/business records and the
//! atomic JSON file store behind them.

pub mod contacts;
pub mod persist;

pub use contacts::{
    BusinessContactRecord, ContactStore, ContactsSnapshot, ConversationRecord, ConversationTurn,
    TurnRole,
};
pub use persist::FileStore;
